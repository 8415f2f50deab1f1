//! Status command for showing today's standing at a glance.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use sm_core::{EnforcementState, Verdict, classify_sessions, day_totals, evaluate_day, sessionize};
use sm_db::Database;
use sm_engine::{RAW_EVENT_ENTITY, current_enforcement_state};

use crate::Config;

/// Everything the status command reports, computed over a day window.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub date: NaiveDate,
    pub total_work_sec: i64,
    pub total_distraction_sec: i64,
    pub verdict_preview: Verdict,
    pub enforcement: EnforcementState,
    pub sync_status: String,
    pub pending_push: i64,
}

pub fn build_report(
    db: &Database,
    config: &Config,
    date: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<StatusReport> {
    let daily = config.daily();
    let events: Vec<_> = db
        .events_in_range(start, end)?
        .into_iter()
        .filter(|event| !event.is_idle)
        .collect();
    let mut sessions = sessionize(&events, chrono::Duration::seconds(daily.session_gap_sec));
    classify_sessions(&mut sessions, &db.list_rules()?);
    let totals = day_totals(&sessions);
    let inputs = db.manual_inputs(date)?.unwrap_or_default();

    Ok(StatusReport {
        date,
        total_work_sec: totals.total_work_sec,
        total_distraction_sec: totals.total_distraction_sec,
        verdict_preview: evaluate_day(&sessions, &inputs, &daily),
        enforcement: current_enforcement_state(db, date)?,
        sync_status: db
            .get_config("sync_status")?
            .unwrap_or_else(|| "never synced".to_string()),
        pending_push: db.pending_push_count(RAW_EVENT_ENTITY)?,
    })
}

pub fn render<W: Write>(writer: &mut W, report: &StatusReport, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *writer, report)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "Date: {}", report.date)?;
    writeln!(
        writer,
        "Work: {}m  Distraction: {}m",
        report.total_work_sec / 60,
        report.total_distraction_sec / 60
    )?;
    writeln!(writer, "Verdict preview: {}", report.verdict_preview)?;
    writeln!(
        writer,
        "Enforcement: {}",
        crate::commands::enforcement::describe(report.enforcement)
    )?;
    writeln!(writer, "Sync: {}", report.sync_status)?;
    writeln!(writer, "Pending push: {} events", report.pending_push)?;
    Ok(())
}
