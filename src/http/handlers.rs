use axum::{
   extract::{Path, State},
   http::StatusCode,
   response::{IntoResponse, Response},
   Json,
};
use percent_encoding::percent_decode_str;
use tracing::instrument;

use crate::{
   Error, Result,
   cluster::wire::{CopyBody, StateBody},
   document::Value,
   error::StoreError,
   store::LeaseOutcome,
};

use super::AppState;

fn decode_segments(raw: &str) -> Vec<String> {
   raw
      .split('/')
      .filter(|s| !s.is_empty())
      .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
      .collect()
}

pub async fn banner() -> &'static str {
   "Lighthouse\n"
}

#[instrument(skip(state))]
pub async fn get_data_root(State(state): State<AppState>) -> Result<Json<Value>> {
   Ok(Json(state.store.read(&[])?))
}

#[instrument(skip(state))]
pub async fn get_data(State(state): State<AppState>, Path(raw): Path<String>) -> Result<Json<Value>> {
   let path = decode_segments(&raw);
   Ok(Json(state.store.read(&path)?))
}

pub async fn forbidden() -> Error {
   StoreError::ReadOnly.into()
}

/// The `<code>` segment is part of the wire shape for symmetry with the
/// write endpoints, but `readStaged` has no code check in the store
/// contract — there is only ever one staged buffer, tied to whichever lease
/// is currently held.
#[instrument(skip(state))]
pub async fn get_staged_root(
   State(state): State<AppState>,
   Path(_code): Path<String>,
) -> Result<Json<Value>> {
   Ok(Json(state.store.read_staged(&[])?))
}

#[instrument(skip(state))]
pub async fn get_staged(
   State(state): State<AppState>,
   Path((_code, raw)): Path<(String, String)>,
) -> Result<Json<Value>> {
   let path = decode_segments(&raw);
   Ok(Json(state.store.read_staged(&path)?))
}

#[instrument(skip(state, value))]
pub async fn put_staged_root(
   State(state): State<AppState>,
   Path(code): Path<String>,
   Json(value): Json<Value>,
) -> Result<StatusCode> {
   state.store.stage_set(&code, &[], value)?;
   Ok(StatusCode::CREATED)
}

#[instrument(skip(state, value))]
pub async fn put_staged(
   State(state): State<AppState>,
   Path((code, raw)): Path<(String, String)>,
   Json(value): Json<Value>,
) -> Result<StatusCode> {
   let path = decode_segments(&raw);
   state.store.stage_set(&code, &path, value)?;
   Ok(StatusCode::CREATED)
}

#[instrument(skip(state))]
pub async fn delete_staged_root(
   State(state): State<AppState>,
   Path(code): Path<String>,
) -> Result<StatusCode> {
   state.store.stage_delete(&code, &[])?;
   Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_staged(
   State(state): State<AppState>,
   Path((code, raw)): Path<(String, String)>,
) -> Result<StatusCode> {
   let path = decode_segments(&raw);
   state.store.stage_delete(&code, &path)?;
   Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_lock(State(state): State<AppState>) -> Response {
   match state.store.current_lease_code() {
      Some(code) => (StatusCode::OK, code).into_response(),
      None => StatusCode::NOT_FOUND.into_response(),
   }
}

/// Empty body commits the active lease; a non-empty body is a code to
/// acquire.
#[instrument(skip(state, body))]
pub async fn put_lock(State(state): State<AppState>, body: String) -> Result<Response> {
   let code = body.trim();
   if code.is_empty() {
      let active = state.store.current_lease_code().unwrap_or_default();
      let version = state.store.commit(&active)?;
      return Ok((StatusCode::OK, Json(version)).into_response());
   }

   match state.store.try_acquire_lease(code)? {
      LeaseOutcome::Acquired | LeaseOutcome::Refreshed => Ok(StatusCode::OK.into_response()),
   }
}

/// Commits if `code` matches the active lease. A mismatch (including "no
/// lease at all") is reported as 404 for this code-addressed route, not the
/// generic 403 `/update` endpoints use for the same underlying condition.
#[instrument(skip(state))]
pub async fn put_lock_code(State(state): State<AppState>, Path(code): Path<String>) -> Result<Response> {
   if state.store.current_lease_code().as_deref() != Some(code.as_str()) {
      return Ok(StatusCode::NOT_FOUND.into_response());
   }
   let version = state.store.commit(&code)?;
   Ok((StatusCode::OK, Json(version)).into_response())
}

#[instrument(skip(state))]
pub async fn delete_lock_code(State(state): State<AppState>, Path(code): Path<String>) -> Response {
   if state.store.current_lease_code().as_deref() != Some(code.as_str()) {
      return StatusCode::NOT_FOUND.into_response();
   }
   match state.store.abort(&code) {
      Ok(()) => StatusCode::OK.into_response(),
      Err(_) => StatusCode::NOT_FOUND.into_response(),
   }
}

#[instrument(skip(state))]
pub async fn get_copy(State(state): State<AppState>) -> Json<CopyBody> {
   let (version, data) = state.store.snapshot();
   Json(CopyBody { version, data })
}

/// Peer push. Always acknowledges 201 regardless of whether the version was
/// actually accepted — rejection as stale is silent by design (§4.2).
#[instrument(skip(state, body))]
pub async fn put_copy(State(state): State<AppState>, Json(body): Json<CopyBody>) -> StatusCode {
   state.store.push_remote(body.version, body.data);
   StatusCode::CREATED
}

#[instrument(skip(state))]
pub async fn get_state(State(state): State<AppState>) -> Json<StateBody> {
   Json(StateBody { version: state.store.current_version(), cluster: state.cluster.state_dict() })
}

#[instrument(skip(state, body))]
pub async fn put_state(State(state): State<AppState>, Json(body): Json<StateBody>) -> StatusCode {
   state.cluster.integrate(&body.cluster);
   StatusCode::OK
}
