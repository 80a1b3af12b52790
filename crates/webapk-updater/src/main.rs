//! `webapk-updater` — checks installed WebAPKs for manifest changes and sends
//! update requests.
//!
//! Reads `updater.toml` (or the path given with `--config`) layered under
//! `WEBAPK_*` environment variables, and keeps app records in SQLite.
//!
//! ```
//! webapk-updater register app.json
//! webapk-updater check-all --run-now
//! ```

use std::{
  io::Read as _,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use webapk_core::{
  app::{AppId, NewApp},
  store::AppRecordStore,
};
use webapk_store_sqlite::SqliteStore;
use webapk_updater::{
  ChannelScheduler, CheckReport, HttpManifestFetcher, HttpUpdateDispatcher,
  ScheduledUpdate, UpdateManager, UpdaterConfig,
};

type Manager =
  UpdateManager<SqliteStore, HttpManifestFetcher, HttpUpdateDispatcher, ChannelScheduler>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "WebAPK update checker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "updater.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Register an installed app from a JSON file (`-` for stdin).
  Register { file: PathBuf },
  /// List registered apps and their update state.
  List,
  /// Check one app for manifest changes.
  Check {
    app_id:  String,
    /// Dispatch any update scheduled by the check right away.
    #[arg(long)]
    run_now: bool,
  },
  /// Check every registered app.
  CheckAll {
    #[arg(long)]
    run_now: bool,
  },
  /// Dispatch every pending update request.
  RunPending,
  /// Print the stored record of one app.
  Status { app_id: String },
  /// Record that the user dismissed the update disclosure for an app.
  DismissDisclosure { app_id: String },
  /// Forget an uninstalled app.
  Forget { app_id: String },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = UpdaterConfig::load(&cli.config).context("failed to load configuration")?;
  let (manager, mut queue) = build_manager(&cfg).await?;

  match cli.command {
    Command::Register { file } => {
      let raw = read_input(&file)?;
      let app: NewApp =
        serde_json::from_str(&raw).context("failed to parse app description")?;
      let record = manager
        .store()
        .register(app, Utc::now())
        .await
        .context("failed to register app")?;
      println!("registered {}", record.app_id);
    }
    Command::List => {
      let now = Utc::now();
      let records = manager.store().list().await.context("failed to list apps")?;
      for record in records {
        println!(
          "{}\t{}\t{}",
          record.app_id,
          manager.policy().state(&record, now).as_str(),
          record.name
        );
      }
    }
    Command::Check { app_id, run_now } => {
      let id = AppId::new(app_id);
      let report = manager.check_for_update(&id, Utc::now()).await?;
      print_report(&id, &report);
      if run_now {
        drain(&manager, &mut queue).await;
      }
    }
    Command::CheckAll { run_now } => {
      for (id, report) in manager.check_all(Utc::now()).await? {
        print_report(&id, &report);
      }
      if run_now {
        drain(&manager, &mut queue).await;
      }
    }
    Command::RunPending => {
      for (id, outcome) in manager.run_all_pending(Utc::now()).await? {
        println!("{id}\t{:?}", outcome.result);
      }
    }
    Command::Status { app_id } => {
      let id = AppId::new(app_id);
      let record = manager
        .store()
        .get(&id)
        .await
        .context("failed to read app")?
        .with_context(|| format!("app {id} is not registered"))?;
      let state = manager.policy().state(&record, Utc::now());
      println!("{}", serde_json::to_string_pretty(&record)?);
      println!("state: {}", state.as_str());
    }
    Command::DismissDisclosure { app_id } => {
      let id = AppId::new(app_id);
      manager
        .store()
        .set_dismissed_disclosure(&id, true)
        .await
        .with_context(|| format!("failed to update {id}"))?;
    }
    Command::Forget { app_id } => {
      let id = AppId::new(app_id);
      if !manager.forget(&id).await? {
        tracing::warn!(app_id = %id, "app was not registered");
      }
    }
  }

  Ok(())
}

async fn build_manager(
  cfg: &UpdaterConfig,
) -> anyhow::Result<(Manager, UnboundedReceiver<ScheduledUpdate>)> {
  let store_path = cfg.resolved_store_path();
  if let Some(parent) = store_path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let fetcher = HttpManifestFetcher::new(cfg.fetch_timeout())
    .context("failed to build manifest client")?;
  let dispatcher = HttpUpdateDispatcher::new(&cfg.update_server_url, cfg.fetch_timeout())
    .context("failed to build update client")?;
  let (scheduler, queue) = ChannelScheduler::new();

  let policy = cfg.policy().context("invalid update intervals")?;
  let manager = UpdateManager::new(
    policy,
    store,
    fetcher,
    dispatcher,
    scheduler,
    cfg.resolved_pending_dir(),
  )
  .with_fetch_timeout(cfg.fetch_timeout());
  Ok((manager, queue))
}

/// Run every update scheduled so far in this process.
async fn drain(manager: &Manager, queue: &mut UnboundedReceiver<ScheduledUpdate>) {
  while let Ok(job) = queue.try_recv() {
    match manager.run_pending_update(&job.app_id, Utc::now()).await {
      Ok(Some(outcome)) => println!("{}\tupdate {:?}", job.app_id, outcome.result),
      Ok(None) => {}
      Err(e) => tracing::error!(app_id = %job.app_id, "update failed: {e}"),
    }
  }
}

fn print_report(id: &AppId, report: &CheckReport) {
  match report {
    CheckReport::Skipped => println!("{id}\tnot due"),
    CheckReport::NoChange => println!("{id}\tup to date"),
    CheckReport::MarkedSuccess => println!("{id}\tup to date (cleared failure)"),
    CheckReport::Scheduled { reason, stale_manifest, .. } => {
      let note = if *stale_manifest { " (stale manifest)" } else { "" };
      println!("{id}\tupdate scheduled: {}{note}", reason.as_str());
    }
  }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
  if path.as_os_str() == "-" {
    let mut raw = String::new();
    std::io::stdin()
      .read_to_string(&mut raw)
      .context("failed to read stdin")?;
    return Ok(raw);
  }
  std::fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))
}
