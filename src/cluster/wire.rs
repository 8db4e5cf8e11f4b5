//! Wire shapes shared between the peer HTTP client (`cluster::monitor`) and
//! the inbound HTTP facade, so both sides serialize identically.

use serde::{Deserialize, Serialize};

use crate::{document::Value, version::Version};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerDescriptor {
   pub address:           String,
   pub version:           Version,
   pub reachable:         bool,
   pub last_reachable_at: Option<String>,
   pub last_push_at:      Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateBody {
   pub version: Version,
   pub cluster: Vec<PeerDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyBody {
   pub version: Version,
   pub data:    Value,
}
