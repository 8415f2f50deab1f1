//! Sync command for running one reconciliation cycle.

use std::io::Write;

use anyhow::Result;

use sm_db::Database;

use crate::Config;
use crate::commands::util::{build_sync_manager, describe_outcome};

pub async fn run<W: Write>(writer: &mut W, db: Database, config: &Config) -> Result<()> {
    let manager = build_sync_manager(db, config)?;
    let outcome = manager.sync_now().await;
    writeln!(writer, "{}", describe_outcome(&outcome))?;
    Ok(())
}
