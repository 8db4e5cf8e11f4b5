//! Filesystem and time utilities shared across the store and snapshot layers.

use std::{fs::File, path::Path};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::{Result, SnapshotError};

/// Fsyncs a directory's inode after a rename into it, so the rename survives
/// a crash (ground: the same pattern the teacher uses after every
/// write-then-rename in its manifest/snapshot code).
pub fn fsync_dir(path: &Path) -> Result<()> {
   let dir = File::open(path)?;
   dir.sync_all()?;
   Ok(())
}

/// Parses a relative-time expression like `"-7 days"`, `"-24 hours"`,
/// `"-30 minutes"`, or `"-10 seconds"` into an absolute UTC cutoff. An empty
/// string means "no limit" (used by `--bootstrap` to disable the freshness
/// check). Mirrors the original's `config.py` relative-time flag syntax.
pub fn parse_relative_cutoff(expr: &str) -> Result<Option<DateTime<Utc>>> {
   let trimmed = expr.trim();
   if trimmed.is_empty() {
      return Ok(None);
   }

   let mut parts = trimmed.split_whitespace();
   let amount_str = parts
      .next()
      .ok_or_else(|| SnapshotError::InvalidRelativeTime(expr.to_string()))?;
   let unit = parts
      .next()
      .ok_or_else(|| SnapshotError::InvalidRelativeTime(expr.to_string()))?;
   if parts.next().is_some() {
      return Err(SnapshotError::InvalidRelativeTime(expr.to_string()).into());
   }

   let amount: i64 = amount_str
      .parse()
      .map_err(|_| SnapshotError::InvalidRelativeTime(expr.to_string()))?;

   let duration = match unit.trim_end_matches('s') {
      "second" => ChronoDuration::seconds(amount),
      "minute" => ChronoDuration::minutes(amount),
      "hour" => ChronoDuration::hours(amount),
      "day" => ChronoDuration::days(amount),
      "week" => ChronoDuration::weeks(amount),
      _ => return Err(SnapshotError::InvalidRelativeTime(expr.to_string()).into()),
   };

   Ok(Some(Utc::now() + duration))
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn empty_expression_means_no_limit() {
      assert!(parse_relative_cutoff("").unwrap().is_none());
   }

   #[test]
   fn negative_days_parses_to_a_past_cutoff() {
      let cutoff = parse_relative_cutoff("-7 days").unwrap().unwrap();
      assert!(cutoff < Utc::now());
   }

   #[test]
   fn rejects_malformed_expressions() {
      assert!(parse_relative_cutoff("banana").is_err());
      assert!(parse_relative_cutoff("-7 fortnights").is_err());
   }
}
