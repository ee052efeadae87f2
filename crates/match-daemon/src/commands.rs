//! Command implementations for the match daemon.
//!
//! Every invocation resolves settings, takes the snapshot lock, opens the
//! snapshot and runs the startup load-or-rebuild before touching the index.
//! The lock is held until the command's save is done. A startup that can
//! neither load nor rebuild aborts the command.

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::{debug, info};

use match_types::Settings;
use match_vector::{
    EmptySource, JsonlRecordSource, RecordSource, SharedIndex, SnapshotStore, StartupOutcome,
};

use crate::cli::{Cli, Commands};
use crate::lock::SnapshotLock;

/// Load settings and apply CLI overrides (highest precedence).
pub fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    if let Some(path) = &cli.snapshot {
        settings.snapshot_path = path.clone();
    }
    if let Some(path) = &cli.records {
        settings.records_path = Some(path.clone());
    }
    if let Some(dimension) = cli.dimension {
        settings.dimension = dimension;
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// The records file when one is configured, otherwise an empty source.
///
/// The empty source only seeds a fresh index; a corrupt snapshot is never
/// replaced from it.
pub fn record_source(settings: &Settings) -> Box<dyn RecordSource> {
    match settings.expanded_records_path() {
        Some(path) => Box::new(JsonlRecordSource::new(path)),
        None => Box::new(EmptySource),
    }
}

/// Open the snapshot and bring the index to the serving state.
pub fn open_index(settings: &Settings) -> Result<(SharedIndex, StartupOutcome)> {
    let path = settings.expanded_snapshot_path();
    let snapshot = SnapshotStore::open(&path)
        .with_context(|| format!("Failed to open snapshot location {:?}", path))?
        .with_fsync(settings.fsync);

    let index = SharedIndex::new(settings.dimension, snapshot);
    let source = record_source(settings);
    let outcome = index
        .load_or_rebuild(source.as_ref())
        .context("Index could not be loaded or rebuilt")?;

    match &outcome {
        StartupOutcome::Loaded { size } => info!(vectors = *size, "Index ready"),
        StartupOutcome::Rebuilt { reason, report } => {
            info!(?reason, vectors = report.unique_ids, "Index ready after rebuild")
        }
        StartupOutcome::AlreadyLoaded { size } => debug!(vectors = *size, "Index already loaded"),
    }

    Ok((index, outcome))
}

/// Run one command and return its JSON output.
pub fn run_command(settings: &Settings, command: &Commands) -> Result<String> {
    let _lock = SnapshotLock::acquire(&settings.expanded_snapshot_path())?;
    let (index, _) = open_index(settings)?;

    let output = match command {
        Commands::Status => {
            let stats = index.stats()?;
            serde_json::to_value(stats)?
        }
        Commands::Upsert { id, vector } => {
            index
                .upsert(*id, vector)
                .with_context(|| format!("Failed to upsert id {}", id))?;
            json!({ "id": id, "status": "ok" })
        }
        Commands::Remove { id } => {
            let removed = index
                .remove(*id)
                .with_context(|| format!("Failed to remove id {}", id))?;
            json!({ "id": id, "removed": removed })
        }
        Commands::Search { vector, k } => {
            let k = k.unwrap_or(settings.default_top_k);
            let results = index.search(vector, k).context("Search failed")?;
            serde_json::to_value(results)?
        }
        Commands::Rebuild => {
            let Some(path) = settings.expanded_records_path() else {
                bail!("No records file configured; pass --records or set records_path");
            };
            let report = index
                .force_rebuild(&JsonlRecordSource::new(path))
                .context("Rebuild failed")?;
            serde_json::to_value(report)?
        }
    };

    Ok(serde_json::to_string_pretty(&output)?)
}
