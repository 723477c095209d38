//! Admin dashboard.

use axum::{Extension, extract::State};

use crate::{
    db::DbPool,
    handlers::{ApiResult, respond},
    middleware::auth::AuthContext,
    models::dashboard::DashboardOverview,
    services::dashboard_service,
};

pub async fn overview(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<DashboardOverview> {
    let overview = dashboard_service::overview(&pool, &auth).await?;
    respond(overview, "Dashboard retrieved")
}
