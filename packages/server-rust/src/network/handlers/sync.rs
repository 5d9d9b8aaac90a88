//! Incremental workshop listing for client caches.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::{Actor, ApiError, AppState};
use crate::service::Request;

#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    /// Cursor from the previous response; omitted means everything.
    #[serde(default)]
    pub since: u64,
}

/// `GET /sync/workshops?since=` -- `{workshops, cursor}`.
pub async fn changes_handler(
    State(state): State<AppState>,
    actor: Actor,
    query: Result<Query<ChangesQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(ChangesQuery { since }) = query?;
    let resp = state.execute(Request::ChangesSince { since }, actor).await?;
    Ok(resp.into_response())
}
