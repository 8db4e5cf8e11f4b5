//! The versioned document store: single-writer/multi-reader lease protocol,
//! staged-edit buffer, atomic commit, anti-entropy merge point.

use std::{
   sync::Arc,
   sync::atomic::{AtomicBool, Ordering},
   time::Instant,
};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::instrument;

use crate::{
   Result,
   document::{Path, Value},
   error::StoreError,
   snapshot::SnapshotManager,
   version::Version,
};

/// A client-chosen opaque lock code granting exclusive write access to the
/// staged buffer for `lease_ttl`. `base_version` is the committed version at
/// acquisition time; a commit whose `base_version` no longer matches the
/// live committed version means a peer push landed during the lease, and the
/// commit must fail with `Conflict` rather than silently clobbering the
/// newer remote state.
#[derive(Debug, Clone)]
struct Lease {
   code:         String,
   acquired_at:  Instant,
   base_version: Version,
}

/// Whether a `tryAcquireLease` call minted a brand-new lease or refreshed an
/// existing one held by the same code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseOutcome {
   Acquired,
   Refreshed,
}

struct StoreState {
   committed:         Value,
   committed_version: Version,
   staged:            Value,
   lease:             Option<Lease>,
}

/// The replicated document and its commit protocol. All state transitions
/// happen under `state`'s mutex; the lock is never held across I/O or
/// `.await` (ground: the crate's `Store mutex` concurrency contract).
pub struct Store {
   state:       Mutex<StoreState>,
   lease_ttl:   std::time::Duration,
   available:   AtomicBool,
   snapshot:    SnapshotManager,
   /// Notified after every successful commit/push_remote. `Store` does not
   /// own `Cluster`; whatever subsystem wants to react to new versions
   /// subscribes to this instead (ground: teacher's `Server` struct holding
   /// a `watch::Sender<bool>` it notifies without owning the receiver).
   changed:     Arc<Notify>,
}

impl Store {
   pub fn new(
      initial_version: Version,
      initial_data: Value,
      available: bool,
      lease_ttl: std::time::Duration,
      snapshot: SnapshotManager,
      changed: Arc<Notify>,
   ) -> Self {
      Self {
         state: Mutex::new(StoreState {
            committed: initial_data.clone(),
            committed_version: initial_version,
            staged: initial_data,
            lease: None,
         }),
         lease_ttl,
         available: AtomicBool::new(available),
         snapshot,
         changed,
      }
   }

   pub fn is_available(&self) -> bool {
      self.available.load(Ordering::Acquire)
   }

   fn mark_available(&self) {
      self.available.store(true, Ordering::Release);
   }

   pub fn changed(&self) -> Arc<Notify> {
      Arc::clone(&self.changed)
   }

   /// Drops an expired lease and its staged buffer. Must be called with the
   /// state lock already held.
   fn expire_if_needed(&self, state: &mut StoreState) {
      if let Some(lease) = &state.lease {
         if lease.acquired_at.elapsed() > self.lease_ttl {
            state.lease = None;
            state.staged = state.committed.clone();
         }
      }
   }

   #[instrument(skip(self))]
   pub fn read(&self, path: &Path) -> Result<Value> {
      if !self.is_available() {
         return Err(StoreError::Unavailable.into());
      }
      let state = self.state.lock();
      state.committed.get(path).cloned().map_err(|_| StoreError::NotFound.into())
   }

   #[instrument(skip(self))]
   pub fn read_staged(&self, path: &Path) -> Result<Value> {
      if !self.is_available() {
         return Err(StoreError::Unavailable.into());
      }
      let mut state = self.state.lock();
      self.expire_if_needed(&mut state);
      if state.lease.is_none() {
         return Err(StoreError::NoLease.into());
      }
      state.staged.get(path).cloned().map_err(|_| StoreError::NotFound.into())
   }

   #[instrument(skip(self))]
   pub fn try_acquire_lease(&self, code: &str) -> Result<LeaseOutcome> {
      let mut state = self.state.lock();
      self.expire_if_needed(&mut state);

      match &state.lease {
         Some(existing) if existing.code != code => Err(StoreError::LeaseHeldByOther.into()),
         Some(_) => {
            state.lease.as_mut().expect("checked above").acquired_at = Instant::now();
            Ok(LeaseOutcome::Refreshed)
         },
         None => {
            state.staged = state.committed.clone();
            state.lease = Some(Lease {
               code:         code.to_string(),
               acquired_at:  Instant::now(),
               base_version: state.committed_version.clone(),
            });
            Ok(LeaseOutcome::Acquired)
         },
      }
   }

   /// Returns the active lease's code, if any and not expired, for `GET
   /// /lock`. Distinct from the `NoLease`/`LeaseHeldByOther` errors other
   /// operations raise: an absent lease here is reported by the caller as a
   /// plain 404, not a 403.
   pub fn current_lease_code(&self) -> Option<String> {
      let mut state = self.state.lock();
      self.expire_if_needed(&mut state);
      state.lease.as_ref().map(|l| l.code.clone())
   }

   fn require_live_lease<'a>(&self, state: &'a mut StoreState, code: &str) -> Result<()> {
      self.expire_if_needed(state);
      match &state.lease {
         Some(lease) if lease.code == code => Ok(()),
         _ => Err(StoreError::NoLease.into()),
      }
   }

   #[instrument(skip(self, value))]
   pub fn stage_set(&self, code: &str, path: &Path, value: Value) -> Result<()> {
      let mut state = self.state.lock();
      self.require_live_lease(&mut state, code)?;
      state.staged.set(path, value).map_err(|_| StoreError::NotFound.into())
   }

   #[instrument(skip(self))]
   pub fn stage_delete(&self, code: &str, path: &Path) -> Result<()> {
      let mut state = self.state.lock();
      self.require_live_lease(&mut state, code)?;
      state.staged.delete(path).map_err(|_| StoreError::NotFound.into())
   }

   /// Commits the staged buffer, advancing the version (release is treated
   /// as an unconditional promotion of `staged` onto the base it was staged
   /// from; spurious no-op commits still advance the sequence). Fails with
   /// `Conflict` if a peer push landed since the lease was acquired. Triggers
   /// a snapshot write and notifies `changed` outside the lock.
   #[instrument(skip(self))]
   pub fn commit(&self, code: &str) -> Result<Version> {
      let (version, data) = {
         let mut state = self.state.lock();
         self.require_live_lease(&mut state, code)?;

         let base_version = state.lease.as_ref().expect("checked by require_live_lease").base_version.clone();
         if base_version != state.committed_version {
            return Err(StoreError::Conflict.into());
         }

         let next_checksum = state.staged.checksum();
         let next_version = state.committed_version.next(next_checksum);
         state.committed = state.staged.clone();
         state.committed_version = next_version.clone();
         state.lease = None;
         (next_version, state.committed.clone())
      };

      self.mark_available();
      self.snapshot.write(&version, &data);
      self.changed.notify_waiters();
      Ok(version)
   }

   #[instrument(skip(self))]
   pub fn abort(&self, code: &str) -> Result<()> {
      let mut state = self.state.lock();
      self.require_live_lease(&mut state, code)?;
      state.staged = state.committed.clone();
      state.lease = None;
      Ok(())
   }

   pub fn current_version(&self) -> Version {
      self.state.lock().committed_version.clone()
   }

   /// Shared-immutable read of the committed version and document, taken
   /// under the lock and then released — callers must not hold this across
   /// I/O.
   pub fn snapshot(&self) -> (Version, Value) {
      let state = self.state.lock();
      (state.committed_version.clone(), state.committed.clone())
   }

   /// Anti-entropy merge point: accepts `(remote_version, remote_data)` iff
   /// `remote_version > committed_version`. Silent rejection otherwise. A
   /// lease held across an accepted push is left in place — its edits are
   /// not discarded — but its `base_version` is now stale, so the next
   /// `commit` on that lease fails with `Conflict` instead of clobbering the
   /// newer remote state.
   #[instrument(skip(self, data))]
   pub fn push_remote(&self, version: Version, data: Value) -> bool {
      let accepted = {
         let mut state = self.state.lock();
         if version <= state.committed_version {
            false
         } else {
            state.committed = data.clone();
            state.committed_version = version.clone();
            true
         }
      };

      if accepted {
         self.mark_available();
         self.snapshot.write(&version, &data);
         self.changed.notify_waiters();
      }
      accepted
   }
}
