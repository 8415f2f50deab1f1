//! Enforcement command for showing today's restriction policy.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;

use sm_db::Database;
use sm_engine::current_enforcement_state;

pub fn run<W: Write>(writer: &mut W, db: &Database, today: NaiveDate, json: bool) -> Result<()> {
    let state = current_enforcement_state(db, today)?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &state)?;
        writeln!(writer)?;
        return Ok(());
    }
    writeln!(writer, "{}", describe(state))?;
    Ok(())
}

/// One-line human description of an enforcement state.
#[must_use]
pub const fn describe(state: sm_core::EnforcementState) -> &'static str {
    match (state.block_non_essential, state.strict_mode) {
        (true, _) => "restricted: non-essential apps blocked, strict limits",
        (false, true) => "strict limits in force",
        (false, false) => "unrestricted",
    }
}
