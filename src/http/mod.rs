//! REST facade over `Store`/`Cluster`. Owns no state of its own; every
//! handler is a thin mapping onto store/cluster calls (ground: spec's
//! "facade owns no state" contract, served with `axum` since none of the
//! retrieved teacher candidates run a real HTTP stack).

mod handlers;

use std::sync::Arc;

use axum::{
   Router,
   routing::{get, put},
};
use tower_http::trace::TraceLayer;

use crate::{cluster::Cluster, store::Store};

#[derive(Clone)]
pub struct AppState {
   pub store:   Arc<Store>,
   pub cluster: Arc<Cluster>,
}

pub fn router(store: Arc<Store>, cluster: Arc<Cluster>) -> Router {
   let state = AppState { store, cluster };

   Router::new()
      .route("/", get(handlers::banner))
      .route("/data", get(handlers::get_data_root).put(handlers::forbidden).delete(handlers::forbidden))
      // The catch-all below never matches an empty remainder, so the root
      // needs its own route for the trailing-slash form too.
      .route("/data/", get(handlers::get_data_root).put(handlers::forbidden).delete(handlers::forbidden))
      .route(
         "/data/{*path}",
         get(handlers::get_data).put(handlers::forbidden).delete(handlers::forbidden),
      )
      .route("/update/{code}", get(handlers::get_staged_root).put(handlers::put_staged_root).delete(handlers::delete_staged_root))
      .route(
         "/update/{code}/",
         get(handlers::get_staged_root).put(handlers::put_staged_root).delete(handlers::delete_staged_root),
      )
      .route(
         "/update/{code}/{*path}",
         get(handlers::get_staged).put(handlers::put_staged).delete(handlers::delete_staged),
      )
      .route("/lock", get(handlers::get_lock).put(handlers::put_lock))
      .route("/lock/{code}", put(handlers::put_lock_code).delete(handlers::delete_lock_code))
      .route("/copy", get(handlers::get_copy).put(handlers::put_copy))
      .route("/state", get(handlers::get_state).put(handlers::put_state))
      .layer(TraceLayer::new_for_http())
      .with_state(state)
}
