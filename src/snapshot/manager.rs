//! Snapshot directory management: filename generation, newest-wins load,
//! and retention sweep (ground: teacher's `snapshot/manifest.rs` atomic
//! write pattern and `snapshot/gc.rs` retain/delete sweep over a directory
//! of timestamped entries).

use std::{fs, path::PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
   Result,
   document::Value,
   error::SnapshotError,
   version::Version,
};

use super::manifest::SnapshotFile;

const FILENAME_FORMAT: &str = "%Y%m%dT%H%M%S%.6f";

/// Outcome of attempting to load a store's state from disk at startup.
pub enum LoadOutcome {
   /// A snapshot loaded and passed the `loadLimit` freshness check.
   Loaded { version: Version, data: Value },
   /// No snapshot existed, or the newest one parsed but failed the
   /// freshness check (or no file in the directory parsed at all) — the
   /// store must start in Unavailable mode.
   Unavailable,
}

#[derive(Clone)]
pub struct SnapshotManager {
   dir: PathBuf,
}

impl SnapshotManager {
   pub fn new(dir: PathBuf) -> Self {
      Self { dir }
   }

   pub fn dir(&self) -> &PathBuf {
      &self.dir
   }

   fn filename_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
      self.dir.join(format!("{}.json", timestamp.format(FILENAME_FORMAT)))
   }

   /// Writes a fresh snapshot file, never overwriting an existing filename.
   /// Logged at `warn` and swallowed on failure per the crate's logging
   /// policy — snapshot I/O never fails a commit.
   pub fn write(&self, version: &Version, data: &Value) {
      if let Err(e) = self.try_write(version, data) {
         warn!(error = %e, "snapshot write failed");
      }
   }

   fn try_write(&self, version: &Version, data: &Value) -> Result<()> {
      fs::create_dir_all(&self.dir)?;
      let path = self.filename_for(Utc::now());
      let file = SnapshotFile { version: version.clone(), data: data.clone() };
      file.write_atomic(&path)
   }

   /// Lists snapshot filenames sorted newest-first. Lexicographic sort
   /// matches chronological order because of the fixed-width timestamp
   /// format.
   fn list_sorted_desc(&self) -> Result<Vec<PathBuf>> {
      if !self.dir.exists() {
         return Ok(Vec::new());
      }
      let mut names: Vec<PathBuf> = fs::read_dir(&self.dir)?
         .filter_map(|e| e.ok())
         .map(|e| e.path())
         .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
         .collect();
      names.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
      Ok(names)
   }

   fn parse_timestamp(path: &std::path::Path) -> Option<DateTime<Utc>> {
      let stem = path.file_stem()?.to_str()?;
      let naive = chrono::NaiveDateTime::parse_from_str(stem, FILENAME_FORMAT).ok()?;
      Some(naive.and_utc())
   }

   /// Enumerates the directory, attempting to load each file (newest first)
   /// until one parses. If the newest file's timestamp predates `load_limit`
   /// (when `Some`), the store must enter Unavailable mode regardless of
   /// whether an older file would otherwise parse.
   pub fn load_latest(&self, load_limit: Option<DateTime<Utc>>) -> Result<LoadOutcome> {
      let names = self.list_sorted_desc()?;

      if let (Some(newest), Some(cutoff)) = (names.first(), load_limit) {
         if let Some(ts) = Self::parse_timestamp(newest) {
            if ts < cutoff {
               return Ok(LoadOutcome::Unavailable);
            }
         }
      }

      for path in &names {
         match SnapshotFile::load(path) {
            Ok(file) => return Ok(LoadOutcome::Loaded { version: file.version, data: file.data }),
            Err(e) => {
               warn!(error = %e, path = %path.display(), "failed to parse snapshot, trying older");
            },
         }
      }

      Ok(LoadOutcome::Unavailable)
   }

   /// Deletes snapshot files older than `cutoff`. Always retains the single
   /// newest file regardless of age, so a fresh store under aggressive
   /// `rmLimit` settings never deletes its only copy of the state.
   pub fn sweep_retention(&self, cutoff: Option<DateTime<Utc>>) -> Result<Vec<PathBuf>> {
      let Some(cutoff) = cutoff else {
         return Ok(Vec::new());
      };

      let names = self.list_sorted_desc()?;
      let mut deleted = Vec::new();
      for (i, path) in names.iter().enumerate() {
         if i == 0 {
            continue;
         }
         let Some(ts) = Self::parse_timestamp(path) else {
            continue;
         };
         if ts < cutoff {
            if let Err(e) = fs::remove_file(path) {
               warn!(error = %e, path = %path.display(), "failed to delete stale snapshot");
            } else {
               deleted.push(path.clone());
            }
         }
      }
      Ok(deleted)
   }
}

impl From<SnapshotError> for crate::Error {
   fn from(e: SnapshotError) -> Self {
      Self::Snapshot(e)
   }
}

#[cfg(test)]
mod tests {
   use std::{thread::sleep, time::Duration};

   use indexmap::IndexMap;
   use tempfile::tempdir;

   use super::*;

   fn version(seq: u64) -> Version {
      Version { sequence: seq, checksum: [seq as u8; 16] }
   }

   fn doc() -> Value {
      let mut m = IndexMap::new();
      m.insert("a".to_string(), Value::Number(1.into()));
      Value::Map(m)
   }

   #[test]
   fn write_then_load_latest_round_trips() {
      let dir = tempdir().unwrap();
      let manager = SnapshotManager::new(dir.path().to_path_buf());
      manager.write(&version(1), &doc());

      match manager.load_latest(None).unwrap() {
         LoadOutcome::Loaded { version: v, .. } => assert_eq!(v.sequence, 1),
         LoadOutcome::Unavailable => panic!("expected a loaded snapshot"),
      }
   }

   #[test]
   fn no_snapshot_directory_is_unavailable() {
      let dir = tempdir().unwrap();
      let manager = SnapshotManager::new(dir.path().join("nonexistent"));
      assert!(matches!(manager.load_latest(None).unwrap(), LoadOutcome::Unavailable));
   }

   #[test]
   fn newest_wins_on_load() {
      let dir = tempdir().unwrap();
      let manager = SnapshotManager::new(dir.path().to_path_buf());
      manager.write(&version(1), &doc());
      sleep(Duration::from_millis(2));
      manager.write(&version(2), &doc());

      match manager.load_latest(None).unwrap() {
         LoadOutcome::Loaded { version: v, .. } => assert_eq!(v.sequence, 2),
         LoadOutcome::Unavailable => panic!("expected a loaded snapshot"),
      }
   }

   #[test]
   fn stale_newest_snapshot_triggers_unavailable() {
      let dir = tempdir().unwrap();
      let manager = SnapshotManager::new(dir.path().to_path_buf());
      manager.write(&version(1), &doc());

      let cutoff = Utc::now() + chrono::Duration::seconds(10);
      assert!(matches!(manager.load_latest(Some(cutoff)).unwrap(), LoadOutcome::Unavailable));
   }

   #[test]
   fn retention_sweep_deletes_old_files_but_keeps_the_newest() {
      let dir = tempdir().unwrap();
      let manager = SnapshotManager::new(dir.path().to_path_buf());
      manager.write(&version(1), &doc());
      sleep(Duration::from_millis(2));
      manager.write(&version(2), &doc());

      let cutoff = Utc::now() + chrono::Duration::seconds(10);
      let deleted = manager.sweep_retention(Some(cutoff)).unwrap();
      assert_eq!(deleted.len(), 1);
      assert_eq!(manager.list_sorted_desc().unwrap().len(), 1);
   }
}
