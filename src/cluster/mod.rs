//! Peer registry and anti-entropy fan-out.

pub mod monitor;
pub mod wire;

use std::{
   collections::HashMap,
   net::ToSocketAddrs,
   sync::Arc,
   time::Duration,
};

use parking_lot::Mutex;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::{config::DEFAULT_PEER_PORT, store::Store};

pub use monitor::PeerMonitor;
pub use wire::{CopyBody, PeerDescriptor, StateBody};

/// Owns the set of `PeerMonitor`s keyed by normalized address, plus the
/// immutable address this process identifies itself as.
pub struct Cluster {
   self_addr:    String,
   peers:        Mutex<HashMap<String, Arc<PeerMonitor>>>,
   store:        Arc<Store>,
   client:       Client,
   ping_period:  Duration,
   reaction_var: Duration,
   cancel:       CancellationToken,
}

impl Cluster {
   pub fn new(
      self_addr: &str,
      store: Arc<Store>,
      ping_period: Duration,
      reaction_var: Duration,
      cancel: CancellationToken,
   ) -> Arc<Self> {
      let self_addr = normalize_addr(self_addr).unwrap_or_else(|| self_addr.to_string());
      Arc::new(Self {
         self_addr,
         peers: Mutex::new(HashMap::new()),
         store,
         client: Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default(),
         ping_period,
         reaction_var,
         cancel,
      })
   }

   pub fn self_addr(&self) -> &str {
      &self.self_addr
   }

   /// Normalizes `addr_raw` and, if new, creates and spawns a `PeerMonitor`
   /// for it. Returns `false` only when normalization itself fails; adding
   /// self or a previously-known peer is a no-op success.
   pub fn add_peer(self: &Arc<Self>, addr_raw: &str) -> bool {
      let Some(addr) = normalize_addr(addr_raw) else {
         return false;
      };
      if addr == self.self_addr {
         return true;
      }

      let mut peers = self.peers.lock();
      if peers.contains_key(&addr) {
         return true;
      }

      let monitor = PeerMonitor::new(addr.clone());
      monitor.clone().spawn(
         Arc::clone(&self.store),
         Arc::downgrade(self),
         self.client.clone(),
         self.ping_period,
         self.reaction_var,
         self.cancel.clone(),
      );
      peers.insert(addr, monitor);
      true
   }

   /// Raises `forcePush` on every known monitor.
   pub fn signal_push_all(&self) {
      for monitor in self.peers.lock().values() {
         monitor.signal_push();
      }
   }

   /// Sorted descriptors of all known peers, for the `/state` response.
   pub fn state_dict(&self) -> Vec<PeerDescriptor> {
      let mut descriptors: Vec<PeerDescriptor> =
         self.peers.lock().values().map(|m| m.descriptor()).collect();
      descriptors.sort_by(|a, b| a.address.cmp(&b.address));
      descriptors
   }

   /// Integrates a gossip payload's peer list: transitive discovery of
   /// peers-of-peers.
   pub fn integrate(self: &Arc<Self>, descriptors: &[PeerDescriptor]) {
      for descriptor in descriptors {
         self.add_peer(&descriptor.address);
      }
   }
}

/// Normalizes `host[:port]` to `ip:port`, defaulting to port 8001 and
/// resolving hostnames to an IPv4 address (ground:
/// `original_source/lighthouse/helpers.py::normalize_addr`).
pub fn normalize_addr(raw: &str) -> Option<String> {
   let trimmed = raw.trim();
   if trimmed.is_empty() {
      return None;
   }

   let (host, port) = match trimmed.rsplit_once(':') {
      Some((h, p)) => {
         let port: u16 = p.parse().ok()?;
         (h, port)
      },
      None => (trimmed, DEFAULT_PEER_PORT),
   };

   let lookup = format!("{host}:{port}");
   let resolved = lookup
      .to_socket_addrs()
      .ok()?
      .find(|addr| addr.is_ipv4())?;
   Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn normalizes_explicit_host_and_port() {
      assert_eq!(normalize_addr("127.0.0.1:9000").as_deref(), Some("127.0.0.1:9000"));
   }

   #[test]
   fn defaults_to_port_8001() {
      assert_eq!(normalize_addr("127.0.0.1").as_deref(), Some("127.0.0.1:8001"));
   }

   #[test]
   fn rejects_empty_address() {
      assert!(normalize_addr("").is_none());
   }
}
