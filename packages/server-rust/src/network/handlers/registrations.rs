//! Submission, cancellation and waitlist endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::{Actor, ApiError, AppState};
use crate::service::{Request, Submission};

/// `POST /workshops/{id}/registrations`
///
/// 201 when accepted or waitlisted, 200 with the reason when rejected, 422
/// with per-field failures when the answers do not validate.
pub async fn submit_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
    body: Result<Json<Submission>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(submission) = body?;
    let resp = state
        .execute(
            Request::SubmitRegistration {
                workshop_id,
                submission,
            },
            actor,
        )
        .await?;
    Ok(resp.into_response())
}

/// `DELETE /workshops/{id}/registrations/{registration_id}`
pub async fn cancel_registration_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path((workshop_id, registration_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let resp = state
        .execute(
            Request::CancelRegistration {
                workshop_id,
                registration_id,
            },
            actor,
        )
        .await?;
    Ok(resp.into_response())
}

/// `GET /workshops/{id}/waitlist`
pub async fn get_waitlist_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
) -> Result<Response, ApiError> {
    let resp = state.execute(Request::GetWaitlist { workshop_id }, actor).await?;
    Ok(resp.into_response())
}

/// `POST /workshops/{id}/waitlist/promote` -- `{registration: null}` when
/// nobody could be promoted.
pub async fn promote_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
) -> Result<Response, ApiError> {
    let resp = state
        .execute(Request::PromoteFromWaitlist { workshop_id }, actor)
        .await?;
    Ok(resp.into_response())
}
