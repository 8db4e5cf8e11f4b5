//! The on-disk snapshot schema: `{"version": {...}, "data": <document>}`.

use std::{
   fs,
   io::Write,
   path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Result, document::Value, util::fsync_dir, version::Version};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
   pub version: Version,
   pub data:    Value,
}

impl SnapshotFile {
   pub fn load(path: &Path) -> Result<Self> {
      let raw = fs::read_to_string(path)?;
      let file: SnapshotFile = serde_json::from_str(&raw)?;
      Ok(file)
   }

   /// Writes the snapshot to `path` via write-then-rename. Never overwrites
   /// an existing filename: callers must pick a filename that has not been
   /// used before (the timestamp format makes collisions pathological).
   pub fn write_atomic(&self, path: &Path) -> Result<()> {
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }
      let tmp_path = temp_path(path);
      let data = serde_json::to_string_pretty(self)?;
      {
         let mut file = fs::File::create(&tmp_path)?;
         file.write_all(data.as_bytes())?;
         file.sync_all()?;
      }
      fs::rename(&tmp_path, path)?;
      if let Some(parent) = path.parent() {
         fsync_dir(parent)?;
      }
      Ok(())
   }
}

fn temp_path(path: &Path) -> PathBuf {
   let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot");
   path.with_file_name(format!("{name}.tmp"))
}

#[cfg(test)]
mod tests {
   use indexmap::IndexMap;
   use tempfile::tempdir;

   use super::*;

   #[test]
   fn round_trips_through_atomic_write() {
      let dir = tempdir().unwrap();
      let path = dir.path().join("20260101T000000.000000.json");
      let mut map = IndexMap::new();
      map.insert("a".to_string(), Value::Number(1.into()));
      let file = SnapshotFile { version: Version { sequence: 1, checksum: [7u8; 16] }, data: Value::Map(map) };

      file.write_atomic(&path).unwrap();
      assert!(path.exists());
      assert!(!path.with_file_name(format!("{}.tmp", path.file_name().unwrap().to_str().unwrap())).exists());

      let loaded = SnapshotFile::load(&path).unwrap();
      assert_eq!(loaded.version, file.version);
   }
}
