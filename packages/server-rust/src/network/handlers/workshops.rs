//! Workshop lifecycle endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use workshop_core::NewWorkshop;

use super::{Actor, ApiError, AppState};
use crate::service::Request;

/// `POST /workshops` -- creates a draft workshop, 201 on success.
pub async fn create_workshop_handler(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<NewWorkshop>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = body?;
    let resp = state.execute(Request::CreateWorkshop { input }, actor).await?;
    Ok((StatusCode::CREATED, resp).into_response())
}

/// `GET /workshops/{id}`
pub async fn get_workshop_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
) -> Result<Response, ApiError> {
    let resp = state.execute(Request::GetWorkshop { workshop_id }, actor).await?;
    Ok(resp.into_response())
}

/// `POST /workshops/{id}/publish` -- 422 with the schema problems when the
/// form cannot be published.
pub async fn publish_workshop_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
) -> Result<Response, ApiError> {
    let resp = state
        .execute(Request::PublishWorkshop { workshop_id }, actor)
        .await?;
    Ok(resp.into_response())
}

/// `POST /workshops/{id}/archive`
pub async fn archive_workshop_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
) -> Result<Response, ApiError> {
    let resp = state
        .execute(Request::ArchiveWorkshop { workshop_id }, actor)
        .await?;
    Ok(resp.into_response())
}
