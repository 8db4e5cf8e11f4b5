use std::io;

use axum::{
   Json,
   http::StatusCode,
   response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Top-level error type for the Lighthouse application.
///
/// Mirrors the layered shape of a production error enum: one variant per
/// subsystem, each wrapping a dedicated sub-enum. `IntoResponse` is the single
/// place that translates any of these into an HTTP status code.
#[derive(Debug, Error)]
pub enum Error {
   #[error("document error: {0}")]
   Document(#[from] DocumentError),

   #[error("store error: {0}")]
   Store(#[from] StoreError),

   #[error("snapshot error: {0}")]
   Snapshot(#[from] SnapshotError),

   #[error("cluster error: {0}")]
   Cluster(#[from] ClusterError),

   #[error("http error: {0}")]
   Http(#[from] HttpError),

   #[error("io error: {0}")]
   Io(#[from] io::Error),

   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   #[error("config error: {0}")]
   Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum DocumentError {
   #[error("not found")]
   NotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
   #[error("not found")]
   NotFound,

   #[error("no active lease")]
   NoLease,

   #[error("lease held by another client")]
   LeaseHeldByOther,

   #[error("concurrent commit collision")]
   Conflict,

   #[error("store is unavailable")]
   Unavailable,

   #[error("malformed request: {0}")]
   BadRequest(String),

   #[error("/data is read-only; use /update/<code>/... to stage edits")]
   ReadOnly,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
   #[error("no valid snapshot found in {0}")]
   NoValidSnapshot(String),

   #[error("corrupt manifest: {0}")]
   CorruptManifest(String),

   #[error("invalid relative time expression: {0}")]
   InvalidRelativeTime(String),
}

#[derive(Debug, Error)]
pub enum ClusterError {
   #[error("invalid peer address: {0}")]
   InvalidAddress(String),
}

/// Outbound peer HTTP failures. Never surfaced to an inbound client; monitors
/// log these at `debug` and mark the peer unreachable.
#[derive(Debug, Error)]
pub enum HttpError {
   #[error("request failed: {0}")]
   Request(#[from] reqwest::Error),

   #[error("unexpected status: {0}")]
   Status(u16),

   #[error("malformed peer response: {0}")]
   MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
   #[error("failed to load configuration: {0}")]
   Load(String),

   #[error("invalid bind address: {0}")]
   InvalidBind(String),
}

impl From<figment::Error> for Error {
   fn from(e: figment::Error) -> Self {
      Self::Config(ConfigError::Load(e.to_string()))
   }
}

impl IntoResponse for Error {
   fn into_response(self) -> Response {
      let (status, message) = match &self {
         Self::Document(DocumentError::NotFound) => (StatusCode::NOT_FOUND, self.to_string()),
         Self::Store(e) => match e {
            StoreError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
            StoreError::NoLease | StoreError::LeaseHeldByOther | StoreError::ReadOnly => {
               (StatusCode::FORBIDDEN, e.to_string())
            },
            StoreError::Conflict => (StatusCode::CONFLICT, e.to_string()),
            StoreError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            StoreError::BadRequest(_) => (StatusCode::BAD_REQUEST, e.to_string()),
         },
         Self::Snapshot(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
         Self::Cluster(_) | Self::Http(_) => (StatusCode::BAD_REQUEST, self.to_string()),
         Self::Json(_) => (StatusCode::BAD_REQUEST, self.to_string()),
         Self::Io(_) | Self::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
         },
      };

      (status, Json(json!({ "error": message }))).into_response()
   }
}

/// Standard result type using [`enum@Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
