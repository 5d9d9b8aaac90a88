//! HTTP handlers for the workshop API.
//!
//! Handlers translate HTTP into [`Request`]s, run them through the
//! [`ServiceStack`], and render [`OperationResponse`]s and errors as JSON.

pub mod forms;
pub mod health;
pub mod registrations;
pub mod sync;
pub mod workshops;

pub use forms::{
    add_field_handler, get_form_handler, remove_field_handler, reorder_fields_handler,
    set_default_fields_handler, update_field_handler, validate_schema_handler,
};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use registrations::{
    cancel_registration_handler, get_waitlist_handler, promote_handler, submit_handler,
};
pub use sync::changes_handler;
pub use workshops::{
    archive_workshop_handler, create_workshop_handler, get_workshop_handler,
    publish_workshop_handler,
};

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use workshop_core::Outcome;

use super::{NetworkConfig, ShutdownController};
use crate::service::{OperationError, OperationResponse, Request, ServiceStack};

/// Header carrying the authenticated caller, set by an upstream gateway.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Shared application state passed to all axum handlers via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    /// Domain services and the operation pipeline.
    pub stack: Arc<ServiceStack>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Runs `request` through the stack while counted as in flight.
    ///
    /// # Errors
    ///
    /// [`ApiError::Draining`] once shutdown has begun, otherwise whatever the
    /// operation returns.
    pub async fn execute(
        &self,
        request: Request,
        actor: Actor,
    ) -> Result<OperationResponse, ApiError> {
        if !self.shutdown.health_state().accepts_requests() {
            return Err(ApiError::Draining);
        }
        let _guard = self.shutdown.in_flight_guard();
        Ok(self.stack.execute(request, actor.0).await?)
    }
}

/// Caller identity from [`ACTOR_HEADER`]. Absent or blank means anonymous.
#[derive(Debug, Clone, Default)]
pub struct Actor(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Ok(Actor(actor))
    }
}

/// Error rendered as `{error, message, failures?}`.
#[derive(Debug)]
pub enum ApiError {
    Operation(OperationError),
    /// Malformed body or query string.
    BadRequest(String),
    Draining,
}

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        ApiError::Operation(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// HTTP status for an operation error.
#[must_use]
pub fn status_for(err: &OperationError) -> StatusCode {
    use workshop_core::SchemaError;

    match err {
        OperationError::ValidationFailed { .. }
        | OperationError::SchemaInvalid { .. }
        | OperationError::Schema(
            SchemaError::InvalidField { .. }
            | SchemaError::UnknownId { .. }
            | SchemaError::DuplicateId { .. },
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        OperationError::WorkshopNotFound { .. }
        | OperationError::RegistrationNotFound { .. }
        | OperationError::Schema(SchemaError::NotFound { .. }) => StatusCode::NOT_FOUND,
        OperationError::SchemaLocked { .. } => StatusCode::CONFLICT,
        OperationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        OperationError::PersistenceUnavailable(_) | OperationError::Overloaded => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        OperationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        OperationError::UnknownService { .. }
        | OperationError::WrongService
        | OperationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Draining => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "draining",
                    "message": "server is shutting down",
                })),
            )
                .into_response(),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_request", "message": message })),
            )
                .into_response(),
            ApiError::Operation(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::warn!(code = err.code(), error = %err, "request failed");
                }
                let mut body = json!({
                    "error": err.code(),
                    "message": err.to_string(),
                });
                match &err {
                    OperationError::ValidationFailed { failures } => {
                        body["failures"] = json!(failures);
                    }
                    OperationError::SchemaInvalid { errors } => {
                        body["failures"] = json!(errors);
                    }
                    _ => {}
                }
                (status, Json(body)).into_response()
            }
        }
    }
}

impl IntoResponse for OperationResponse {
    fn into_response(self) -> Response {
        match self {
            OperationResponse::Workshop(workshop) => Json(workshop).into_response(),
            OperationResponse::Field(field) => Json(field).into_response(),
            OperationResponse::Form(form) => Json(form).into_response(),
            OperationResponse::SchemaReport { errors } => Json(json!({
                "valid": errors.is_empty(),
                "errors": errors,
            }))
            .into_response(),
            OperationResponse::Submission(receipt) => {
                let status = match receipt.outcome {
                    Outcome::Rejected { .. } => StatusCode::OK,
                    Outcome::Accepted { .. } | Outcome::Waitlisted { .. } => StatusCode::CREATED,
                };
                (status, Json(receipt)).into_response()
            }
            OperationResponse::Registration(registration) => Json(registration).into_response(),
            OperationResponse::Promoted(registration) => {
                Json(json!({ "registration": registration })).into_response()
            }
            OperationResponse::Waitlist(entries) => {
                Json(json!({ "entries": entries })).into_response()
            }
            OperationResponse::Changes { workshops, cursor } => {
                Json(json!({ "workshops": workshops, "cursor": cursor })).into_response()
            }
            OperationResponse::Empty => StatusCode::NO_CONTENT.into_response(),
        }
    }
}
