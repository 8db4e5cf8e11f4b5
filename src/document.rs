//! The replicated value tree and path addressing.

use indexmap::IndexMap;
use md5::{Digest, Md5};
use serde::{
   Deserialize, Serialize,
   de::{self, Deserializer},
   ser::{SerializeMap, SerializeSeq, Serializer},
};
use serde_json::Number;

use crate::error::DocumentError;

/// A single path segment. Map lookups use the segment verbatim; sequence
/// lookups parse it as a non-negative integer.
pub type Path = [String];

/// A node in the replicated tree: a scalar, an ordered map, or an ordered
/// sequence. `Map` uses [`IndexMap`] so edits preserve insertion order;
/// [`Value::checksum`] / canonical serialization is the only place key order
/// is normalized (sorted ascending).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
   Null,
   Bool(bool),
   Number(Number),
   String(String),
   Map(IndexMap<String, Value>),
   Seq(Vec<Value>),
}

impl Value {
   pub fn empty_map() -> Self {
      Self::Map(IndexMap::new())
   }

   pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
      match self {
         Self::Map(m) => Some(m),
         _ => None,
      }
   }

   pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
      match self {
         Self::Map(m) => Some(m),
         _ => None,
      }
   }

   pub fn as_seq_mut(&mut self) -> Option<&mut Vec<Value>> {
      match self {
         Self::Seq(s) => Some(s),
         _ => None,
      }
   }

   /// Traverses `path` from this value. Never mutates.
   pub fn get(&self, path: &Path) -> Result<&Value, DocumentError> {
      let mut current = self;
      for segment in path {
         current = match current {
            Self::Map(m) => m.get(segment).ok_or(DocumentError::NotFound)?,
            Self::Seq(s) => {
               let idx: usize = segment.parse().map_err(|_| DocumentError::NotFound)?;
               s.get(idx).ok_or(DocumentError::NotFound)?
            },
            _ => return Err(DocumentError::NotFound),
         };
      }
      Ok(current)
   }

   /// Replaces the value at `path`. The empty path replaces the root.
   /// Intermediate parents are never created.
   pub fn set(&mut self, path: &Path, value: Value) -> Result<(), DocumentError> {
      let Some((last, parent_path)) = path.split_last() else {
         *self = value;
         return Ok(());
      };
      let parent = self.get_mut(parent_path)?;
      match parent {
         Self::Map(m) => {
            m.insert(last.clone(), value);
            Ok(())
         },
         Self::Seq(s) => {
            let idx: usize = last.parse().map_err(|_| DocumentError::NotFound)?;
            let slot = s.get_mut(idx).ok_or(DocumentError::NotFound)?;
            *slot = value;
            Ok(())
         },
         _ => Err(DocumentError::NotFound),
      }
   }

   /// Deletes the value at `path`. The empty path resets the root to an
   /// empty map. Sequence deletes shift the tail left.
   pub fn delete(&mut self, path: &Path) -> Result<(), DocumentError> {
      let Some((last, parent_path)) = path.split_last() else {
         *self = Value::empty_map();
         return Ok(());
      };
      let parent = self.get_mut(parent_path)?;
      match parent {
         Self::Map(m) => {
            m.shift_remove(last).ok_or(DocumentError::NotFound)?;
            Ok(())
         },
         Self::Seq(s) => {
            let idx: usize = last.parse().map_err(|_| DocumentError::NotFound)?;
            if idx >= s.len() {
               return Err(DocumentError::NotFound);
            }
            s.remove(idx);
            Ok(())
         },
         _ => Err(DocumentError::NotFound),
      }
   }

   fn get_mut(&mut self, path: &Path) -> Result<&mut Value, DocumentError> {
      let mut current = self;
      for segment in path {
         current = match current {
            Self::Map(m) => m.get_mut(segment).ok_or(DocumentError::NotFound)?,
            Self::Seq(s) => {
               let idx: usize = segment.parse().map_err(|_| DocumentError::NotFound)?;
               s.get_mut(idx).ok_or(DocumentError::NotFound)?
            },
            _ => return Err(DocumentError::NotFound),
         };
      }
      Ok(current)
   }

   /// MD5 over the canonical serialization (sorted map keys, two-space
   /// indent, no trailing newline).
   pub fn checksum(&self) -> [u8; 16] {
      let mut buf = String::new();
      write_canonical(self, &mut buf, 0);
      let digest = Md5::digest(buf.as_bytes());
      digest.into()
   }
}

fn write_canonical(value: &Value, buf: &mut String, indent: usize) {
   match value {
      Value::Null => buf.push_str("null"),
      Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
      Value::Number(n) => buf.push_str(&n.to_string()),
      Value::String(s) => {
         buf.push_str(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()));
      },
      Value::Seq(items) => {
         if items.is_empty() {
            buf.push_str("[]");
            return;
         }
         buf.push('[');
         let inner = indent + 2;
         for (i, item) in items.iter().enumerate() {
            if i > 0 {
               buf.push(',');
            }
            buf.push('\n');
            buf.push_str(&" ".repeat(inner));
            write_canonical(item, buf, inner);
         }
         buf.push('\n');
         buf.push_str(&" ".repeat(indent));
         buf.push(']');
      },
      Value::Map(map) => {
         if map.is_empty() {
            buf.push_str("{}");
            return;
         }
         let mut keys: Vec<&String> = map.keys().collect();
         keys.sort();
         buf.push('{');
         let inner = indent + 2;
         for (i, key) in keys.iter().enumerate() {
            if i > 0 {
               buf.push(',');
            }
            buf.push('\n');
            buf.push_str(&" ".repeat(inner));
            buf.push_str(&serde_json::to_string(key).unwrap_or_default());
            buf.push_str(": ");
            write_canonical(&map[*key], buf, inner);
         }
         buf.push('\n');
         buf.push_str(&" ".repeat(indent));
         buf.push('}');
      },
   }
}

impl From<serde_json::Value> for Value {
   fn from(v: serde_json::Value) -> Self {
      match v {
         serde_json::Value::Null => Self::Null,
         serde_json::Value::Bool(b) => Self::Bool(b),
         serde_json::Value::Number(n) => Self::Number(n),
         serde_json::Value::String(s) => Self::String(s),
         serde_json::Value::Array(items) => Self::Seq(items.into_iter().map(Self::from).collect()),
         serde_json::Value::Object(map) => {
            Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
         },
      }
   }
}

impl From<Value> for serde_json::Value {
   fn from(v: Value) -> Self {
      match v {
         Value::Null => Self::Null,
         Value::Bool(b) => Self::Bool(b),
         Value::Number(n) => Self::Number(n),
         Value::String(s) => Self::String(s),
         Value::Seq(items) => Self::Array(items.into_iter().map(Self::from).collect()),
         Value::Map(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
      }
   }
}

impl Serialize for Value {
   fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
      match self {
         Self::Null => serializer.serialize_none(),
         Self::Bool(b) => serializer.serialize_bool(*b),
         Self::Number(n) => n.serialize(serializer),
         Self::String(s) => serializer.serialize_str(s),
         Self::Seq(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
               seq.serialize_element(item)?;
            }
            seq.end()
         },
         Self::Map(map) => {
            let mut ser_map = serializer.serialize_map(Some(map.len()))?;
            for (k, v) in map {
               ser_map.serialize_entry(k, v)?;
            }
            ser_map.end()
         },
      }
   }
}

impl<'de> Deserialize<'de> for Value {
   fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
      let raw = serde_json::Value::deserialize(deserializer).map_err(de::Error::custom)?;
      Ok(Self::from(raw))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn path(segments: &[&str]) -> Vec<String> {
      segments.iter().map(|s| s.to_string()).collect()
   }

   fn sample() -> Value {
      let mut map = IndexMap::new();
      map.insert("a".to_string(), Value::Number(1.into()));
      map.insert(
         "b".to_string(),
         Value::Seq(vec![Value::Number(2.into()), Value::Number(3.into())]),
      );
      Value::Map(map)
   }

   #[test]
   fn get_traverses_maps_and_sequences() {
      let doc = sample();
      assert_eq!(doc.get(&path(&["a"])).unwrap(), &Value::Number(1.into()));
      assert_eq!(doc.get(&path(&["b", "1"])).unwrap(), &Value::Number(3.into()));
   }

   #[test]
   fn get_reports_not_found_through_scalar_or_missing() {
      let doc = sample();
      assert!(doc.get(&path(&["a", "x"])).is_err());
      assert!(doc.get(&path(&["missing"])).is_err());
      assert!(doc.get(&path(&["b", "5"])).is_err());
   }

   #[test]
   fn set_replaces_root_on_empty_path() {
      let mut doc = sample();
      doc.set(&[], Value::Null).unwrap();
      assert_eq!(doc, Value::Null);
   }

   #[test]
   fn set_requires_existing_parent() {
      let mut doc = sample();
      assert!(doc.set(&path(&["missing", "x"]), Value::Null).is_err());
   }

   #[test]
   fn set_inserts_or_replaces_in_map() {
      let mut doc = sample();
      doc.set(&path(&["c"]), Value::Bool(true)).unwrap();
      assert_eq!(doc.get(&path(&["c"])).unwrap(), &Value::Bool(true));
   }

   #[test]
   fn set_requires_in_range_sequence_index() {
      let mut doc = sample();
      doc.set(&path(&["b", "0"]), Value::Number(9.into())).unwrap();
      assert_eq!(doc.get(&path(&["b", "0"])).unwrap(), &Value::Number(9.into()));
      assert!(doc.set(&path(&["b", "9"]), Value::Null).is_err());
   }

   #[test]
   fn delete_empty_path_resets_root() {
      let mut doc = sample();
      doc.delete(&[]).unwrap();
      assert_eq!(doc, Value::empty_map());
   }

   #[test]
   fn delete_then_get_yields_not_found() {
      let mut doc = sample();
      doc.delete(&path(&["a"])).unwrap();
      assert!(doc.get(&path(&["a"])).is_err());
   }

   #[test]
   fn delete_from_sequence_shifts_tail_left() {
      let mut doc = sample();
      doc.delete(&path(&["b", "0"])).unwrap();
      assert_eq!(doc.get(&path(&["b", "0"])).unwrap(), &Value::Number(3.into()));
      assert!(doc.get(&path(&["b", "1"])).is_err());
   }

   #[test]
   fn checksum_is_deterministic_and_key_order_independent() {
      let mut map_a = IndexMap::new();
      map_a.insert("a".to_string(), Value::Number(1.into()));
      map_a.insert("b".to_string(), Value::Number(2.into()));

      let mut map_b = IndexMap::new();
      map_b.insert("b".to_string(), Value::Number(2.into()));
      map_b.insert("a".to_string(), Value::Number(1.into()));

      assert_eq!(Value::Map(map_a).checksum(), Value::Map(map_b).checksum());
   }

   #[test]
   fn checksum_differs_for_different_documents() {
      let a = Value::Number(1.into());
      let b = Value::Number(2.into());
      assert_ne!(a.checksum(), b.checksum());
   }
}
