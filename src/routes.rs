//! HTTP router: every `/api/v1` route behind API key authentication,
//! `/health` public.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, state::AppState};

pub fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // Customers
        .route(
            "/api/v1/customers",
            post(handlers::customers::create_customer).get(handlers::customers::list_customers),
        )
        .route(
            "/api/v1/customers/{id}",
            get(handlers::customers::get_customer).patch(handlers::customers::update_contact),
        )
        .route(
            "/api/v1/customers/{id}/kyc",
            put(handlers::customers::update_kyc_status),
        )
        // Accounts
        .route(
            "/api/v1/accounts",
            post(handlers::accounts::open_account).get(handlers::accounts::list_accounts),
        )
        .route("/api/v1/accounts/{id}", get(handlers::accounts::get_account))
        .route(
            "/api/v1/accounts/{id}/freeze",
            post(handlers::accounts::freeze_account),
        )
        .route(
            "/api/v1/accounts/{id}/unfreeze",
            post(handlers::accounts::unfreeze_account),
        )
        .route(
            "/api/v1/accounts/{id}/close",
            post(handlers::accounts::close_account),
        )
        .route(
            "/api/v1/accounts/{id}/transactions",
            get(handlers::accounts::list_account_transactions),
        )
        .route(
            "/api/v1/accounts/{id}/transactions/export",
            get(handlers::accounts::export_account_transactions),
        )
        .route(
            "/api/v1/accounts/{id}/statements",
            post(handlers::statements::generate_statement)
                .get(handlers::statements::list_statements),
        )
        // Transactions
        .route(
            "/api/v1/transactions/credit",
            post(handlers::transactions::create_credit),
        )
        .route(
            "/api/v1/transactions/debit",
            post(handlers::transactions::create_debit),
        )
        .route(
            "/api/v1/transactions/transfer",
            post(handlers::transactions::create_transfer),
        )
        .route(
            "/api/v1/transactions/{id}",
            get(handlers::transactions::get_transaction),
        )
        // Cards
        .route(
            "/api/v1/cards",
            post(handlers::cards::add_card).get(handlers::cards::list_cards),
        )
        .route(
            "/api/v1/cards/{id}",
            get(handlers::cards::get_card).delete(handlers::cards::remove_card),
        )
        .route(
            "/api/v1/cards/{id}/default",
            post(handlers::cards::set_default_card),
        )
        .route("/api/v1/cards/{id}/verify", post(handlers::cards::verify_card))
        .route(
            "/api/v1/cards/{id}/activate",
            post(handlers::cards::activate_card),
        )
        .route(
            "/api/v1/cards/{id}/suspend",
            post(handlers::cards::suspend_card),
        )
        .route(
            "/api/v1/cards/{id}/reactivate",
            post(handlers::cards::reactivate_card),
        )
        // Credit
        .route(
            "/api/v1/credit/assessments",
            post(handlers::credit::assess_credit).get(handlers::credit::list_assessments),
        )
        .route(
            "/api/v1/credit/assessments/{id}",
            get(handlers::credit::get_assessment),
        )
        // Branches
        .route(
            "/api/v1/branches",
            post(handlers::branches::create_branch).get(handlers::branches::list_branches),
        )
        .route("/api/v1/branches/{id}", get(handlers::branches::get_branch))
        .route(
            "/api/v1/branches/{id}/status",
            put(handlers::branches::set_branch_status),
        )
        .route(
            "/api/v1/branches/{id}/cash",
            post(handlers::branches::adjust_cash),
        )
        .route(
            "/api/v1/branches/{id}/summary",
            get(handlers::branches::branch_summary),
        )
        // Approval workflows
        .route(
            "/api/v1/workflows",
            post(handlers::workflows::submit_request).get(handlers::workflows::list_requests),
        )
        .route("/api/v1/workflows/{id}", get(handlers::workflows::get_request))
        .route(
            "/api/v1/workflows/{id}/approve",
            post(handlers::workflows::approve),
        )
        .route(
            "/api/v1/workflows/{id}/reject",
            post(handlers::workflows::reject),
        )
        // Alerts, audit, dashboard
        .route("/api/v1/alerts", get(handlers::alerts::list_alerts))
        .route(
            "/api/v1/alerts/summary",
            get(handlers::alerts::aggregate_alerts),
        )
        .route(
            "/api/v1/alerts/{id}/acknowledge",
            post(handlers::alerts::acknowledge),
        )
        .route(
            "/api/v1/alerts/{id}/resolve",
            post(handlers::alerts::resolve),
        )
        .route("/api/v1/audit-logs", get(handlers::audit::list_audit_logs))
        .route("/api/v1/dashboard", get(handlers::dashboard::overview))
        // Reconciliation
        .route(
            "/api/v1/reconciliation/runs",
            post(handlers::reconciliation::run_reconciliation)
                .get(handlers::reconciliation::list_runs),
        )
        .route(
            "/api/v1/reconciliation/runs/{id}",
            get(handlers::reconciliation::get_run),
        )
        // Statements
        .route(
            "/api/v1/statements/{id}",
            get(handlers::statements::get_statement),
        )
        .route(
            "/api/v1/statements/{id}/download",
            get(handlers::statements::download_statement),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clients::{sms::SmsClient, three_ds::ThreeDsClient},
        config::test_config,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = test_config();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let three_ds =
            ThreeDsClient::new(&config.three_ds_api_url, &config.three_ds_api_key).unwrap();
        router(AppState::new(pool, config, three_ds, SmsClient::disabled()))
    }

    #[tokio::test]
    async fn api_routes_require_a_bearer_key() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/accounts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid_api_key");
    }

    #[tokio::test]
    async fn malformed_authorization_header_is_rejected() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/cards/3f1c1f4e-8f7a-4b5e-9a43-2d9d1f0c6b11/verify")
                    .method("POST")
                    .header("Authorization", "Basic abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/v2/accounts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
