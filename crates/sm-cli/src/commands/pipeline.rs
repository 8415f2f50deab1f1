//! Pipeline command for evaluating a day and persisting its log.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use sm_db::Database;
use sm_engine::{DailyPipeline, local_day_bounds};

use crate::Config;
use crate::commands::util::{build_sync_manager, describe_outcome};

pub async fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    config: &Config,
    date: Option<NaiveDate>,
) -> Result<()> {
    // The manager owns its own connection; `db` stays borrowed for the
    // pipeline's reads and the log upsert.
    let sync_db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let manager = build_sync_manager(sync_db, config)?;
    let pipeline = DailyPipeline::new(config.daily(), manager);

    let run = match date {
        Some(date) => {
            let (start, end) = local_day_bounds(date);
            pipeline.run_for(db, date, start, end).await?
        }
        None => pipeline.run_today(db).await?,
    };

    writeln!(
        writer,
        "{}: {} (work {}m, distraction {}m)",
        run.log.date,
        run.log.verdict,
        run.log.total_work_sec / 60,
        run.log.total_distraction_sec / 60
    )?;

    // The log is already persisted; sync is best-effort.
    match run.sync.await {
        Ok(outcome) => writeln!(writer, "{}", describe_outcome(&outcome))?,
        Err(err) => tracing::warn!(error = %err, "sync task panicked"),
    }
    Ok(())
}
