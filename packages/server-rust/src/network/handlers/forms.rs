//! Form schema authoring endpoints.
//!
//! Edits that would change the meaning of stored answers are refused with
//! 409 once a workshop has registrations.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use workshop_core::{FieldDraft, FieldPatch};

use super::{Actor, ApiError, AppState};
use crate::service::{OperationResponse, Request};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultFieldsBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOrderBody {
    pub field_ids: Vec<String>,
}

/// `GET /workshops/{id}/form`
///
/// Served from the workshop so it works for every lifecycle state.
pub async fn get_form_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
) -> Result<Response, ApiError> {
    let resp = state.execute(Request::GetWorkshop { workshop_id }, actor).await?;
    match resp {
        OperationResponse::Workshop(workshop) => {
            Ok(Json(workshop.form).into_response())
        }
        other => Ok(other.into_response()),
    }
}

/// `POST /workshops/{id}/form/fields` -- 201 with the stored field.
pub async fn add_field_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
    body: Result<Json<FieldDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(draft) = body?;
    let resp = state
        .execute(Request::AddField { workshop_id, draft }, actor)
        .await?;
    Ok((StatusCode::CREATED, resp).into_response())
}

/// `PATCH /workshops/{id}/form/fields/{field_id}`
pub async fn update_field_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path((workshop_id, field_id)): Path<(String, String)>,
    body: Result<Json<FieldPatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(patch) = body?;
    let resp = state
        .execute(
            Request::UpdateField {
                workshop_id,
                field_id,
                patch,
            },
            actor,
        )
        .await?;
    Ok(resp.into_response())
}

/// `DELETE /workshops/{id}/form/fields/{field_id}` -- returns the form.
pub async fn remove_field_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path((workshop_id, field_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let resp = state
        .execute(
            Request::RemoveField {
                workshop_id,
                field_id,
            },
            actor,
        )
        .await?;
    Ok(resp.into_response())
}

/// `PUT /workshops/{id}/form/order`
pub async fn reorder_fields_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
    body: Result<Json<FieldOrderBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(FieldOrderBody { field_ids }) = body?;
    let resp = state
        .execute(
            Request::ReorderFields {
                workshop_id,
                field_ids,
            },
            actor,
        )
        .await?;
    Ok(resp.into_response())
}

/// `PUT /workshops/{id}/form/defaults`
pub async fn set_default_fields_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
    body: Result<Json<DefaultFieldsBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(DefaultFieldsBody { enabled }) = body?;
    let resp = state
        .execute(
            Request::SetDefaultFields {
                workshop_id,
                enabled,
            },
            actor,
        )
        .await?;
    Ok(resp.into_response())
}

/// `POST /workshops/{id}/form/validate` -- `{valid, errors}`, always 200.
pub async fn validate_schema_handler(
    State(state): State<AppState>,
    actor: Actor,
    Path(workshop_id): Path<String>,
) -> Result<Response, ApiError> {
    let resp = state
        .execute(Request::ValidateSchema { workshop_id }, actor)
        .await?;
    Ok(resp.into_response())
}
