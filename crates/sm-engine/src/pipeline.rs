//! End-of-day evaluation pipeline.
//!
//! Gathers the day's events, sessionizes and classifies them, evaluates
//! the verdict against manual inputs, persists the daily log, and fires
//! a background sync. The pipeline is deterministic over its inputs and
//! safe to re-run: a second run for the same day recomputes and
//! overwrites the log.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;

use sm_core::{
    DailyConfig, DailyLog, EnforcementState, RawEvent, classify_sessions, day_totals,
    determine_consequences, evaluate_day, sessionize,
};
use sm_db::{Database, DbError};

use crate::remote::RemoteStore;
use crate::sync::{SyncManager, SyncOutcome};

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result of a pipeline run. The sync handle lets callers observe the
/// background cycle; dropping it is fine, and a sync failure never
/// retroactively fails the run.
pub struct PipelineRun {
    pub log: DailyLog,
    pub sync: tokio::task::JoinHandle<SyncOutcome>,
}

/// Orchestrates one day's evaluation against a database and a sync manager.
pub struct DailyPipeline<R> {
    config: DailyConfig,
    sync: Arc<SyncManager<R>>,
}

impl<R> DailyPipeline<R>
where
    R: RemoteStore + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(config: DailyConfig, sync: Arc<SyncManager<R>>) -> Self {
        Self { config, sync }
    }

    /// Runs the pipeline for the current local day.
    ///
    /// # Errors
    ///
    /// Returns an error if any database operation fails.
    pub async fn run_today(&self, db: &Database) -> Result<PipelineRun, PipelineError> {
        let today = Local::now().date_naive();
        let (start, end) = local_day_bounds(today);
        self.run_for(db, today, start, end).await
    }

    /// Runs the pipeline for an explicit date and window.
    ///
    /// # Errors
    ///
    /// Returns an error if any database operation fails.
    pub async fn run_for(
        &self,
        db: &Database,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PipelineRun, PipelineError> {
        if let Some(existing) = db.daily_log(date)? {
            tracing::debug!(%date, verdict = %existing.verdict, "daily log exists, recomputing");
        }

        let events: Vec<RawEvent> = db
            .events_in_range(start, end)?
            .into_iter()
            .filter(|event| !event.is_idle)
            .collect();

        let mut sessions = sessionize(
            &events,
            chrono::Duration::seconds(self.config.session_gap_sec),
        );
        let rules = db.list_rules()?;
        classify_sessions(&mut sessions, &rules);

        let inputs = db.manual_inputs(date)?.unwrap_or_default();
        let verdict = evaluate_day(&sessions, &inputs, &self.config);
        let totals = day_totals(&sessions);

        let log = DailyLog {
            date,
            total_work_sec: totals.total_work_sec,
            total_distraction_sec: totals.total_distraction_sec,
            verdict,
            manual: inputs,
        };
        db.upsert_daily_log(&log)?;
        tracing::info!(
            %date,
            verdict = %log.verdict,
            work_sec = log.total_work_sec,
            distraction_sec = log.total_distraction_sec,
            "daily log persisted"
        );

        let sync = self.sync.trigger();
        Ok(PipelineRun { log, sync })
    }
}

/// Enforcement for a given day is derived from the previous day's log.
/// A missing log (fresh install, device off all day) maps to the
/// unrestricted default rather than a punitive one.
///
/// # Errors
///
/// Returns an error if the log lookup fails.
pub fn current_enforcement_state(
    db: &Database,
    today: NaiveDate,
) -> Result<EnforcementState, PipelineError> {
    let Some(yesterday) = today.pred_opt() else {
        return Ok(EnforcementState::default());
    };
    let state = match db.daily_log(yesterday)? {
        Some(log) => determine_consequences(log.verdict),
        None => EnforcementState::default(),
    };
    Ok(state)
}

/// UTC bounds of a local calendar day, half-open.
#[must_use]
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    (local_midnight(date), local_midnight(next))
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Midnight skipped by a DST transition; treat the naive time as
        // if the offset change had not happened.
        LocalResult::None => Local.from_utc_datetime(&naive).with_timezone(&Utc),
    }
}
