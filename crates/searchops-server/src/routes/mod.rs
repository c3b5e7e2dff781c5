//! HTTP route handlers, the response envelope, and error mapping.

pub mod admin_eval;
pub mod admin_index;
pub mod admin_performance;
pub mod search;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use searchops_core::Error;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the main router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(admin_index::routes())
        .merge(admin_eval::routes())
        .merge(admin_performance::routes())
        .merge(search::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The common response envelope wrapping every JSON body.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

/// A successful envelope around `data`.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: "OK".to_string(),
        message: "success".to_string(),
        data: Some(data),
        timestamp: Utc::now(),
    })
}

/// Core errors adapted to HTTP status codes and the envelope.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::ValidationFailed(_)
            | Error::Engine(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope: Envelope<()> = Envelope {
            code: self.0.kind().to_string(),
            message: self.0.to_string(),
            data: None,
            timestamp: Utc::now(),
        };
        (self.status(), Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<Envelope<T>>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (
                Error::ValidationFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (Error::Engine("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                Error::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError(error).status(), expected);
        }
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = ok(serde_json::json!({"value": 1}));
        let json = serde_json::to_value(&envelope.0).unwrap();
        assert_eq!(json["code"], "OK");
        assert_eq!(json["message"], "success");
        assert_eq!(json["data"]["value"], 1);
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_error_envelope_carries_kind_and_message() {
        let error = ApiError(Error::ValidationFailed("count mismatch".into()));
        let envelope: Envelope<()> = Envelope {
            code: error.0.kind().to_string(),
            message: error.0.to_string(),
            data: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["code"], "VALIDATION_FAILED");
        assert!(json["message"].as_str().unwrap().contains("count mismatch"));
        assert!(json.get("data").is_none());
    }
}
