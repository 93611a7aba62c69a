mod app;
mod commands;
mod event;
mod form;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use midas::api::HttpClient;
use midas::cache::{NoopSnapshots, SnapshotStore, SqliteSnapshots};
use midas::clock::{Clock, SystemClock};
use midas::config::Config;
use midas::models::YearMonth;
use midas::store::{Endpoints, Store};

#[derive(Parser, Debug)]
#[command(name = "midas")]
#[command(about = "A terminal client for the Midas personal finance tracker")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/midas/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Month to open, as YYYY-MM (default: the current month)
  #[arg(short, long)]
  month: Option<YearMonth>,

  /// Neither read nor write the on-disk snapshot cache
  #[arg(long)]
  no_cache: bool,
}

/// Log to a daily file; the terminal belongs to the UI.
fn init_logging(config: &Config) -> Result<WorkerGuard> {
  let dir = dirs::state_dir()
    .or_else(dirs::cache_dir)
    .unwrap_or_else(std::env::temp_dir)
    .join("midas");
  std::fs::create_dir_all(&dir)?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "midas.log"));
  let filter =
    EnvFilter::try_from_env("MIDAS_LOG").unwrap_or_else(|_| EnvFilter::new(&config.log.level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = init_logging(&config)?;

  let snapshots: Arc<dyn SnapshotStore> = if config.cache.persist && !args.no_cache {
    Arc::new(SqliteSnapshots::open()?)
  } else {
    Arc::new(NoopSnapshots)
  };

  let client = HttpClient::new(&config.api.url, Config::api_token(), config.timeout())?;
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);
  let month = args
    .month
    .unwrap_or_else(|| YearMonth::containing(clock.today()));

  info!(url = %config.api.url, month = %month, "Starting midas");

  let store = Arc::new(Store::new(
    Endpoints::http(client),
    config.store_options(),
    snapshots,
    clock,
  ));

  let mut app = app::App::new(config, store, month);
  app.run().await?;

  Ok(())
}
