//! Request extractors whose rejections use the failure envelope.
//!
//! axum's own `Json`, `Path` and `Query` reject with plain-text bodies. These
//! wrappers run the same extraction and turn the rejection into
//! `AppError::InvalidRequest`, so a malformed body, a non-UUID id or a bad
//! query value still answers `{success: false, ..., error: "invalid_request"}`.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        routing::{get, post},
    };
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::handlers::{ApiResult, respond};

    #[derive(Debug, Deserialize)]
    struct NewItem {
        amount_cents: i64,
    }

    #[derive(Debug, Deserialize)]
    struct Filter {
        limit: Option<i64>,
    }

    async fn create(Json(body): Json<NewItem>) -> ApiResult<i64> {
        respond(body.amount_cents, "ok")
    }

    async fn show(Path(id): Path<Uuid>) -> ApiResult<Uuid> {
        respond(id, "ok")
    }

    async fn list(Query(filter): Query<Filter>) -> ApiResult<Option<i64>> {
        respond(filter.limit, "ok")
    }

    fn app() -> Router {
        Router::new()
            .route("/items", post(create).get(list))
            .route("/items/{id}", get(show))
    }

    async fn call(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/items")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get_uri(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn assert_invalid_request(status: StatusCode, body: &serde_json::Value) {
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid_request");
        assert!(body["data"].is_null());
        assert!(!body["message"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_uses_the_envelope() {
        let (status, body) = call(post_json("{\"amount_cents\": ")).await;
        assert_invalid_request(status, &body);
    }

    #[tokio::test]
    async fn wrongly_typed_json_uses_the_envelope() {
        let (status, body) = call(post_json("{\"amount_cents\": \"lots\"}")).await;
        assert_invalid_request(status, &body);
    }

    #[tokio::test]
    async fn missing_content_type_uses_the_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/items")
            .body(Body::from("{\"amount_cents\": 5}"))
            .unwrap();
        let (status, body) = call(request).await;
        assert_invalid_request(status, &body);
    }

    #[tokio::test]
    async fn non_uuid_path_uses_the_envelope() {
        let (status, body) = call(get_uri("/items/not-a-uuid")).await;
        assert_invalid_request(status, &body);
    }

    #[tokio::test]
    async fn bad_query_value_uses_the_envelope() {
        let (status, body) = call(get_uri("/items?limit=ten")).await;
        assert_invalid_request(status, &body);
    }

    #[tokio::test]
    async fn valid_requests_pass_through() {
        let (status, body) = call(post_json("{\"amount_cents\": 250}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], 250);

        let id = Uuid::new_v4();
        let (status, body) = call(get_uri(&format!("/items/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], id.to_string());

        let (_, body) = call(get_uri("/items?limit=10")).await;
        assert_eq!(body["data"], 10);
    }
}
