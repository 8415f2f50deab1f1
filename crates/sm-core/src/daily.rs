//! The persisted outcome of one calendar day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::rules::ManualInputs;
use crate::types::Verdict;

/// One day's outcome, keyed by local calendar date.
///
/// Created exclusively by the daily pipeline; a rerun before day rollover
/// recomputes and overwrites it with the same inputs yielding the same
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub total_work_sec: i64,
    pub total_distraction_sec: i64,
    pub verdict: Verdict,
    /// Copy of the self-report the verdict was computed from.
    pub manual: ManualInputs,
}
