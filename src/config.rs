//! Layered configuration: built-in defaults, environment overrides, CLI flags.

use std::{
   path::PathBuf,
   sync::OnceLock,
   time::Duration,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub const LEASE_TTL_MS: u64 = 30_000;
pub const PING_PERIOD_MS: u64 = 500;
pub const REACTION_VAR_MS: u64 = 10;
pub const DEFAULT_PEER_PORT: u16 = 8001;

/// Application configuration loaded from an optional config file, environment
/// variables (`LIGHTHOUSE_*`), and CLI flags, in that order of precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   pub data_dir: PathBuf,
   pub bind: String,
   pub seeds: Vec<String>,
   pub load_limit: String,
   pub rm_limit: String,
   pub bootstrap: bool,
   pub lease_ttl_ms: u64,
   pub ping_period_ms: u64,
   pub reaction_var_ms: u64,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         data_dir: default_data_dir(),
         bind: "localhost:8001".to_string(),
         seeds: Vec::new(),
         load_limit: "-7 days".to_string(),
         rm_limit: "-7 days".to_string(),
         bootstrap: false,
         lease_ttl_ms: LEASE_TTL_MS,
         ping_period_ms: PING_PERIOD_MS,
         reaction_var_ms: REACTION_VAR_MS,
      }
   }
}

/// CLI-sourced overrides, applied on top of defaults + env. `None` fields
/// leave the lower layer's value untouched.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
   pub data_dir:    Option<PathBuf>,
   pub bind:        Option<String>,
   pub seeds:       Option<Vec<String>>,
   pub load_limit:  Option<String>,
   pub rm_limit:    Option<String>,
   pub bootstrap:   bool,
}

impl Config {
   pub fn load(overrides: &CliOverrides) -> Result<Self> {
      let mut figment = Figment::from(Serialized::defaults(Self::default()))
         .merge(Env::prefixed("LIGHTHOUSE_").lowercase(true).split("__"));

      if let Some(dir) = &overrides.data_dir {
         figment = figment.merge(Serialized::default("data_dir", dir));
      }
      if let Some(bind) = &overrides.bind {
         figment = figment.merge(Serialized::default("bind", bind));
      }
      if let Some(seeds) = &overrides.seeds {
         figment = figment.merge(Serialized::default("seeds", seeds));
      }
      if let Some(load_limit) = &overrides.load_limit {
         figment = figment.merge(Serialized::default("load_limit", load_limit));
      }
      if let Some(rm_limit) = &overrides.rm_limit {
         figment = figment.merge(Serialized::default("rm_limit", rm_limit));
      }
      if overrides.bootstrap {
         figment = figment
            .merge(Serialized::default("bootstrap", true))
            .merge(Serialized::default("load_limit", ""));
      }

      figment
         .extract()
         .map_err(|e| ConfigError::Load(e.to_string()).into())
   }

   pub fn lease_ttl(&self) -> Duration {
      Duration::from_millis(self.lease_ttl_ms)
   }

   pub fn ping_period(&self) -> Duration {
      Duration::from_millis(self.ping_period_ms)
   }

   pub fn reaction_var(&self) -> Duration {
      Duration::from_millis(self.reaction_var_ms)
   }
}

/// Reads an optional `lighthouse.toml` layered underneath env/CLI overrides;
/// used by `init` instead of `load` when a config file is expected on disk.
#[allow(dead_code, reason = "wired in once main.rs grows a --config flag")]
fn load_with_file(path: &PathBuf, overrides: &CliOverrides) -> Result<Config> {
   let mut figment =
      Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path));
   figment = figment.merge(Env::prefixed("LIGHTHOUSE_").lowercase(true));
   let _ = overrides;
   figment
      .extract()
      .map_err(|e| ConfigError::Load(e.to_string()).into())
}

/// Initializes and returns the process-wide configuration singleton.
pub fn init(overrides: CliOverrides) -> Result<&'static Config> {
   let config = Config::load(&overrides)?;
   Ok(CONFIG.get_or_init(|| config))
}

pub fn get() -> &'static Config {
   CONFIG.get().expect("config::init must run before config::get")
}

fn default_data_dir() -> PathBuf {
   BaseDirs::new()
      .map(|d| d.home_dir().join(".lighthouse"))
      .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(".lighthouse"))
}

pub fn snapshots_dir(data_dir: &std::path::Path) -> PathBuf {
   data_dir.join("snapshots")
}
