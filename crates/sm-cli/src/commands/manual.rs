//! Manual command for recording the daily self-report.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;

use sm_core::ManualInputs;
use sm_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    date: NaiveDate,
    inputs: ManualInputs,
) -> Result<()> {
    db.upsert_manual_inputs(date, &inputs)?;
    writeln!(
        writer,
        "Recorded for {date}: study={} diet={} sugar_avoided={}",
        inputs.study_done, inputs.diet_followed, inputs.sugar_avoided
    )?;
    Ok(())
}
