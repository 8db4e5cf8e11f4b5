//! Snapshot persistence across a restart: write via `Store`, reload via a
//! fresh `SnapshotManager` pointed at the same directory, and exercise the
//! `loadLimit`/`rmLimit` freshness and retention contracts end to end.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use indexmap::IndexMap;
use lighthouse::{
   document::Value,
   snapshot::{LoadOutcome, SnapshotManager},
   store::Store,
   version::Version,
};
use tokio::sync::Notify;

fn doc_with(key: &str, n: i64) -> Value {
   let mut map = IndexMap::new();
   map.insert(key.to_string(), Value::Number(n.into()));
   Value::Map(map)
}

#[tokio::test]
async fn store_commit_persists_and_reloads_across_a_restart() {
   let dir = tempfile::tempdir().unwrap();
   let snapshot = SnapshotManager::new(dir.path().to_path_buf());
   let store = Store::new(
      Version::zero(),
      Value::empty_map(),
      true,
      Duration::from_secs(30),
      snapshot,
      Arc::new(Notify::new()),
   );

   store.try_acquire_lease("L1").unwrap();
   store
      .stage_set("L1", &["count".to_string()], Value::Number(1.into()))
      .unwrap();
   let committed = store.commit("L1").unwrap();

   // Simulate a restart: a fresh manager over the same directory, as
   // bootstrap does on process start.
   let reopened = SnapshotManager::new(dir.path().to_path_buf());
   match reopened.load_latest(None).unwrap() {
      LoadOutcome::Loaded { version, data } => {
         assert_eq!(version, committed);
         assert_eq!(data.get(&["count".to_string()]).unwrap(), &Value::Number(1.into()));
      },
      LoadOutcome::Unavailable => panic!("expected the committed snapshot to reload"),
   }
}

#[tokio::test]
async fn newest_snapshot_wins_even_with_multiple_commits() {
   let dir = tempfile::tempdir().unwrap();
   let snapshot = SnapshotManager::new(dir.path().to_path_buf());
   let store = Store::new(
      Version::zero(),
      Value::empty_map(),
      true,
      Duration::from_secs(30),
      snapshot,
      Arc::new(Notify::new()),
   );

   for i in 1..=3 {
      store.try_acquire_lease("L1").unwrap();
      store.stage_set("L1", &["count".to_string()], Value::Number(i.into())).unwrap();
      store.commit("L1").unwrap();
      tokio::time::sleep(Duration::from_millis(2)).await;
   }

   let reopened = SnapshotManager::new(dir.path().to_path_buf());
   match reopened.load_latest(None).unwrap() {
      LoadOutcome::Loaded { version, data } => {
         assert_eq!(version.sequence, 3);
         assert_eq!(data.get(&["count".to_string()]).unwrap(), &Value::Number(3.into()));
      },
      LoadOutcome::Unavailable => panic!("expected the newest snapshot to reload"),
   }
}

#[tokio::test]
async fn stale_snapshot_enters_unavailable_mode_until_a_newer_commit_arrives() {
   let dir = tempfile::tempdir().unwrap();
   let snapshot = SnapshotManager::new(dir.path().to_path_buf());
   snapshot.write(&Version { sequence: 1, checksum: [1u8; 16] }, &doc_with("a", 1));

   // loadLimit cutoff in the future relative to the snapshot we just wrote:
   // it must be treated as too stale to load.
   let cutoff = Utc::now() + chrono::Duration::seconds(60);
   assert!(matches!(snapshot.load_latest(Some(cutoff)).unwrap(), LoadOutcome::Unavailable));

   // A bootstrap run (no load-limit check at all) always succeeds.
   assert!(matches!(snapshot.load_latest(None).unwrap(), LoadOutcome::Loaded { .. }));
}

#[tokio::test]
async fn retention_sweep_removes_old_snapshots_but_always_keeps_the_newest() {
   let dir = tempfile::tempdir().unwrap();
   let snapshot = SnapshotManager::new(dir.path().to_path_buf());

   for i in 1..=4 {
      snapshot.write(&Version { sequence: i, checksum: [i as u8; 16] }, &doc_with("a", i as i64));
      tokio::time::sleep(Duration::from_millis(2)).await;
   }

   let cutoff = Utc::now() + chrono::Duration::seconds(60);
   let deleted = snapshot.sweep_retention(Some(cutoff)).unwrap();
   assert_eq!(deleted.len(), 3, "all but the newest snapshot should be deleted");

   match snapshot.load_latest(None).unwrap() {
      LoadOutcome::Loaded { version, .. } => assert_eq!(version.sequence, 4),
      LoadOutcome::Unavailable => panic!("the retained newest snapshot must still load"),
   }
}

#[tokio::test]
async fn no_rm_limit_configured_means_nothing_is_deleted() {
   let dir = tempfile::tempdir().unwrap();
   let snapshot = SnapshotManager::new(dir.path().to_path_buf());
   snapshot.write(&Version { sequence: 1, checksum: [1u8; 16] }, &doc_with("a", 1));

   let deleted = snapshot.sweep_retention(None).unwrap();
   assert!(deleted.is_empty());
}

#[tokio::test]
async fn peer_push_that_restores_service_triggers_a_snapshot_write() {
   let dir = tempfile::tempdir().unwrap();
   let snapshot = SnapshotManager::new(dir.path().to_path_buf());
   let store = Store::new(
      Version::zero(),
      Value::empty_map(),
      false,
      Duration::from_secs(30),
      snapshot,
      Arc::new(Notify::new()),
   );
   assert!(!store.is_available());

   let remote_version = Version { sequence: 7, checksum: [3u8; 16] };
   assert!(store.push_remote(remote_version.clone(), doc_with("restored", 1)));
   assert!(store.is_available());

   let reopened = SnapshotManager::new(dir.path().to_path_buf());
   match reopened.load_latest(None).unwrap() {
      LoadOutcome::Loaded { version, .. } => assert_eq!(version, remote_version),
      LoadOutcome::Unavailable => panic!("push_remote must trigger a snapshot write"),
   }
}
