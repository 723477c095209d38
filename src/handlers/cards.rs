//! Card HTTP handlers.
//!
//! - POST   /api/v1/cards                    add a card (pending verification)
//! - GET    /api/v1/cards?customer_id=...    default first, then newest
//! - GET    /api/v1/cards/{id}
//! - DELETE /api/v1/cards/{id}               remove
//! - POST   /api/v1/cards/{id}/default
//! - POST   /api/v1/cards/{id}/verify        3-D Secure
//! - POST   /api/v1/cards/{id}/activate
//! - POST   /api/v1/cards/{id}/suspend
//! - POST   /api/v1/cards/{id}/reactivate

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Json, Path, Query}, respond, respond_list},
    middleware::auth::AuthContext,
    models::card::{AddCardRequest, CardListQuery, CardResponse, CardStatus, SuspendCardRequest},
    services::card_service,
    state::AppState,
};

/// Add a card.
///
/// The number is checked offline (Luhn, brand, expiry, CVV) before anything
/// is stored, and only brand, last four digits and a fingerprint are kept.
/// The first eligible card of a customer becomes the default.
///
/// # Errors
///
/// - **400**: any validation failure
/// - **404**: customer not found
/// - **409**: the same card is already registered for this customer
pub async fn add_card(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AddCardRequest>,
) -> ApiResult<CardResponse> {
    let card = card_service::add_card(&pool, &auth, request).await?;
    respond(card.into(), "Card added")
}

pub async fn list_cards(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CardListQuery>,
) -> ApiResult<Vec<CardResponse>> {
    let cards = card_service::list_cards(&pool, &auth, query.customer_id).await?;
    respond_list(cards, "Cards retrieved")
}

pub async fn get_card(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<CardResponse> {
    let card = card_service::get_card(&pool, &auth, card_id).await?;
    respond(card.into(), "Card retrieved")
}

pub async fn set_default_card(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<CardResponse> {
    let card = card_service::set_default_card(&pool, &auth, card_id).await?;
    respond(card.into(), "Default card updated")
}

/// Run 3-D Secure for a pending card.
///
/// A declined authentication is still a successful call: the envelope says
/// so in `message` and the card shows the new failure count or `blocked`
/// status. Gateway outages return 502 and leave the card unchanged.
pub async fn verify_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<CardResponse> {
    let result = card_service::verify_card(&state.pool, &state.three_ds, &auth, card_id).await?;

    let message = if result.authenticated {
        "Card verified"
    } else if result.card.status == CardStatus::Blocked.as_ref() {
        "Verification failed, card blocked"
    } else {
        "Verification failed"
    };
    respond(result.card.into(), message)
}

pub async fn activate_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<CardResponse> {
    let card = card_service::activate_card(&state.pool, &state.sms, &auth, card_id).await?;
    respond(card.into(), "Card activated")
}

pub async fn suspend_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(card_id): Path<Uuid>,
    Json(request): Json<SuspendCardRequest>,
) -> ApiResult<CardResponse> {
    let card =
        card_service::suspend_card(&state.pool, &state.sms, &auth, card_id, request.reason).await?;
    respond(card.into(), "Card suspended")
}

pub async fn reactivate_card(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<CardResponse> {
    let card = card_service::reactivate_card(&pool, &auth, card_id).await?;
    respond(card.into(), "Card reactivated")
}

pub async fn remove_card(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<CardResponse> {
    let card = card_service::remove_card(&pool, &auth, card_id).await?;
    respond(card.into(), "Card removed")
}
