use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use lighthouse::{
   cluster::Cluster,
   config::{self, CliOverrides},
   document::Value,
   error::ConfigError,
   snapshot::{LoadOutcome, SnapshotManager},
   store::Store,
   util::parse_relative_cutoff,
   version,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the `lighthouse` daemon.
#[derive(Parser)]
#[command(name = "lighthouse")]
#[command(about = "Replicated hierarchical configuration store")]
#[command(version = version::version_string())]
struct Cli {
   #[arg(long = "data.d", value_name = "DIR", help = "Snapshot directory")]
   data_dir: Option<PathBuf>,

   #[arg(long, default_value = "localhost:8001", help = "Address to bind the HTTP facade to")]
   bind: String,

   #[arg(long, value_delimiter = ',', help = "Comma-separated seed peer addresses")]
   seeds: Vec<String>,

   #[arg(long, help = "Discard snapshots older than this (e.g. \"-7 days\")")]
   load_limit: Option<String>,

   #[arg(long, help = "Delete snapshots older than this (e.g. \"-7 days\")")]
   rm_limit: Option<String>,

   #[arg(long, help = "Disable the load-limit freshness check entirely")]
   bootstrap: bool,

   #[arg(short = 'v', long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
   verbose: u8,
}

#[tokio::main]
async fn main() {
   let cli = Cli::parse();
   init_tracing(cli.verbose);

   if let Err(err) = run(cli).await {
      eprintln!("{err}");
      std::process::exit(2);
   }
}

fn init_tracing(verbose: u8) {
   let default_level = match verbose {
      0 => Level::WARN,
      1 => Level::INFO,
      2 => Level::DEBUG,
      _ => Level::TRACE,
   };
   let filter = EnvFilter::try_from_env("LIGHTHOUSE_LOG")
      .or_else(|_| EnvFilter::try_from_default_env())
      .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
   tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> lighthouse::Result<()> {
   let overrides = CliOverrides {
      data_dir:  cli.data_dir,
      bind:      Some(cli.bind.clone()),
      seeds:     if cli.seeds.is_empty() { None } else { Some(cli.seeds.clone()) },
      load_limit: cli.load_limit,
      rm_limit:  cli.rm_limit,
      bootstrap: cli.bootstrap,
   };
   let config = config::init(overrides)?;

   let bind_addr: SocketAddr = config
      .bind
      .parse()
      .or_else(|_| format!("{}:8001", config.bind).parse())
      .map_err(|_| ConfigError::InvalidBind(config.bind.clone()))?;

   let snapshots_dir = config::snapshots_dir(&config.data_dir);
   let snapshot_manager = SnapshotManager::new(snapshots_dir);

   let load_limit = parse_relative_cutoff(&config.load_limit)?;
   let rm_limit = parse_relative_cutoff(&config.rm_limit)?;
   if let Err(e) = snapshot_manager.sweep_retention(rm_limit) {
      warn!(error = %e, "startup retention sweep failed");
   }

   let (version, data, available) = match snapshot_manager.load_latest(load_limit) {
      Ok(LoadOutcome::Loaded { version, data }) => {
         info!(sequence = version.sequence, "loaded snapshot");
         (version, data, true)
      },
      Ok(LoadOutcome::Unavailable) => {
         warn!("no fresh snapshot found, starting in unavailable mode");
         (lighthouse::version::Version::zero(), Value::empty_map(), false)
      },
      Err(e) => return Err(e),
   };

   let changed = Arc::new(Notify::new());
   let store = Arc::new(Store::new(
      version,
      data,
      available,
      config.lease_ttl(),
      snapshot_manager,
      Arc::clone(&changed),
   ));

   let cancel = CancellationToken::new();
   let cluster = Cluster::new(&config.bind, Arc::clone(&store), config.ping_period(), config.reaction_var(), cancel.clone());

   for seed in &config.seeds {
      if !cluster.add_peer(seed) {
         warn!(seed = %seed, "failed to normalize seed address");
      }
   }

   tokio::spawn({
      let cluster = Arc::clone(&cluster);
      async move {
         loop {
            changed.notified().await;
            cluster.signal_push_all();
         }
      }
   });

   let app = lighthouse::http::router(Arc::clone(&store), Arc::clone(&cluster));
   info!(%bind_addr, "lighthouse listening");
   let listener = tokio::net::TcpListener::bind(bind_addr).await?;

   let shutdown = async {
      let _ = tokio::signal::ctrl_c().await;
      cancel.cancel();
   };
   axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

   Ok(())
}
