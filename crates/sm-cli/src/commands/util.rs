//! Shared helpers for subcommands.

use std::sync::Arc;

use anyhow::{Context, Result};

use sm_db::Database;
use sm_engine::{HttpRemoteStore, SyncManager, SyncOutcome};

use crate::Config;

/// Builds a sync manager over the given database connection, honoring
/// the configured remote (or lack of one).
pub fn build_sync_manager(
    db: Database,
    config: &Config,
) -> Result<Arc<SyncManager<HttpRemoteStore>>> {
    let remote = match &config.remote_url {
        Some(url) => Some(
            HttpRemoteStore::new(url.clone()).context("invalid remote URL in configuration")?,
        ),
        None => None,
    };
    Ok(Arc::new(SyncManager::new(db, remote)))
}

/// One-line human description of a sync outcome.
#[must_use]
pub fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Completed { pushed, pulled } => {
            format!("sync completed: pushed {pushed}, pulled {pulled}")
        }
        SyncOutcome::Busy => "sync already in progress".to_string(),
        SyncOutcome::Disabled => "sync disabled: no remote configured".to_string(),
        SyncOutcome::Offline => "remote unreachable, will retry later".to_string(),
        SyncOutcome::Failed(message) => format!("sync failed: {message}"),
    }
}

/// This machine's identity for event attribution.
#[must_use]
pub fn default_device_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown-device".to_string())
}
