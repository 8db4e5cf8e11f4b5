//! One background task per peer: ping, conditional pull, signalled push.
//!
//! Control flow follows `original_source/lighthouse/monitor.py`'s
//! `_cycle`/`_push`/`_pull` line-for-line: a force-push check gates
//! PUSH vs PULL-OR-PING, and the wait between cycles is a race between the
//! force-push signal and a timer (ground: teacher's `lease.rs` heartbeat
//! task, a `tokio::spawn`ed loop racing a cancellation signal against a
//! timer via `tokio::select!`).

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use reqwest::Client;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{cluster::Cluster, store::Store, version::Version};

use super::wire::{CopyBody, PeerDescriptor, StateBody};

struct MonitorState {
   last_seen_version: Version,
   reachable:         bool,
   last_reachable_at: Option<chrono::DateTime<Utc>>,
   last_push_at:      Option<chrono::DateTime<Utc>>,
}

/// Background task running the ping/pull/push cycle against one peer.
/// Created on first sight of a peer address and never joined; it runs until
/// its `CancellationToken` fires at process shutdown.
pub struct PeerMonitor {
   pub address: String,
   state:       Mutex<MonitorState>,
   force_push:  Notify,
}

impl PeerMonitor {
   pub fn new(address: String) -> Arc<Self> {
      Arc::new(Self {
         address,
         state: Mutex::new(MonitorState {
            last_seen_version: Version::zero(),
            reachable:         false,
            last_reachable_at: None,
            last_push_at:      None,
         }),
         force_push: Notify::new(),
      })
   }

   pub fn signal_push(&self) {
      self.force_push.notify_one();
   }

   pub fn descriptor(&self) -> PeerDescriptor {
      let state = self.state.lock();
      PeerDescriptor {
         address:           self.address.clone(),
         version:           state.last_seen_version.clone(),
         reachable:         state.reachable,
         last_reachable_at: state.last_reachable_at.map(format_timestamp),
         last_push_at:      state.last_push_at.map(format_timestamp),
      }
   }

   /// Spawns the monitor's long-lived loop. Unhandled faults inside a cycle
   /// are caught and logged; the loop itself never exits except on
   /// cancellation.
   pub fn spawn(
      self: Arc<Self>,
      store: Arc<Store>,
      cluster: std::sync::Weak<Cluster>,
      client: Client,
      ping_period: Duration,
      reaction_var: Duration,
      cancel: CancellationToken,
   ) {
      tokio::spawn(async move {
         loop {
            let forced = tokio::select! {
               () = self.force_push.notified() => true,
               () = tokio::time::sleep(ping_period) => false,
               () = cancel.cancelled() => return,
            };

            if forced {
               self.push(&store, &client).await;
            } else {
               self.ping_and_maybe_pull(&store, &cluster, &client).await;
            }

            let jitter_ms = rand::thread_rng().gen_range(0..=reaction_var.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
         }
      });
   }

   #[instrument(skip(self, store, cluster, client), fields(peer = %self.address))]
   async fn ping_and_maybe_pull(&self, store: &Arc<Store>, cluster: &std::sync::Weak<Cluster>, client: &Client) {
      let state_body: StateBody = match self.fetch_state(client).await {
         Ok(body) => body,
         Err(e) => {
            debug!(error = %e, "peer unreachable during ping");
            self.state.lock().reachable = false;
            return;
         },
      };

      {
         let mut state = self.state.lock();
         state.reachable = true;
         state.last_reachable_at = Some(Utc::now());
         state.last_seen_version = state_body.version.clone();
      }

      if let Some(cluster) = cluster.upgrade() {
         cluster.integrate(&state_body.cluster);
      }

      if state_body.version <= store.current_version() {
         return;
      }

      match self.fetch_copy(client).await {
         Ok(copy) => {
            if copy.version > store.current_version() {
               store.push_remote(copy.version, copy.data);
            }
         },
         Err(e) => debug!(error = %e, "peer pull failed"),
      }
   }

   #[instrument(skip(self, store, client), fields(peer = %self.address))]
   async fn push(&self, store: &Arc<Store>, client: &Client) {
      let (version, data) = store.snapshot();
      if version <= self.state.lock().last_seen_version {
         return;
      }

      let url = format!("http://{}/copy", self.address);
      let body = CopyBody { version: version.clone(), data };
      match client.put(&url).json(&body).send().await {
         Ok(resp) if resp.status().is_success() => {
            self.state.lock().last_push_at = Some(Utc::now());
         },
         Ok(resp) => {
            debug!(status = %resp.status(), "peer push rejected");
            self.state.lock().reachable = false;
         },
         Err(e) => {
            debug!(error = %e, "peer push failed");
            self.state.lock().reachable = false;
         },
      }
   }

   async fn fetch_state(&self, client: &Client) -> crate::Result<StateBody> {
      let url = format!("http://{}/state", self.address);
      let resp = client.get(&url).send().await.map_err(crate::error::HttpError::Request)?;
      if !resp.status().is_success() {
         return Err(crate::error::HttpError::Status(resp.status().as_u16()).into());
      }
      resp
         .json::<StateBody>()
         .await
         .map_err(|e| crate::error::HttpError::MalformedResponse(e.to_string()).into())
   }

   async fn fetch_copy(&self, client: &Client) -> crate::Result<CopyBody> {
      let url = format!("http://{}/copy", self.address);
      let resp = client.get(&url).send().await.map_err(crate::error::HttpError::Request)?;
      if !resp.status().is_success() {
         return Err(crate::error::HttpError::Status(resp.status().as_u16()).into());
      }
      resp
         .json::<CopyBody>()
         .await
         .map_err(|e| crate::error::HttpError::MalformedResponse(e.to_string()).into())
   }
}

fn format_timestamp(ts: chrono::DateTime<Utc>) -> String {
   ts.format("%Y%m%dT%H%M%S").to_string()
}
