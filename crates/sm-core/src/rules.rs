//! Classification rules, daily evaluation, and the enforcement policy.

use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::types::{Category, ValidationError, Verdict};

/// A classification pattern mapping an app identity to a category.
///
/// Patterns are uniquely keyed; a rule pulled from the remote store
/// overwrites the local one with the same pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRule {
    pub pkg_name_pattern: String,
    pub category: Category,
}

/// How rule patterns are matched against app identities.
///
/// [`PatternMatcher::Exact`] is the guaranteed contract. [`PatternMatcher::Glob`]
/// is an additive variant behind the same interface; it treats `*` as a
/// wildcard and must never silently replace exact matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternMatcher {
    #[default]
    Exact,
    Glob,
}

impl PatternMatcher {
    /// Whether `pattern` matches `app_pkg_name` under this matcher.
    #[must_use]
    pub fn matches(&self, pattern: &str, app_pkg_name: &str) -> bool {
        match self {
            Self::Exact => pattern == app_pkg_name,
            Self::Glob => glob_matches(pattern, app_pkg_name),
        }
    }
}

/// Anchored glob match where `*` matches any run of characters.
fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for (i, segment) in pattern.split('*').enumerate() {
        if i > 0 {
            regex.push_str(".*");
        }
        regex.push_str(&regex::escape(segment));
    }
    regex.push('$');
    match regex::Regex::new(&regex) {
        Ok(compiled) => compiled.is_match(candidate),
        Err(err) => {
            tracing::warn!(pattern, error = %err, "glob pattern failed to compile");
            false
        }
    }
}

/// Classifies an app identity against the rule set using exact matching.
///
/// No matching rule yields [`Category::Neutral`].
#[must_use]
pub fn classify(app_pkg_name: &str, rules: &[AppRule]) -> Category {
    classify_with(PatternMatcher::Exact, app_pkg_name, rules)
}

/// Classifies an app identity with an explicit matcher. First match wins.
#[must_use]
pub fn classify_with(matcher: PatternMatcher, app_pkg_name: &str, rules: &[AppRule]) -> Category {
    rules
        .iter()
        .find(|rule| matcher.matches(&rule.pkg_name_pattern, app_pkg_name))
        .map_or(Category::Neutral, |rule| rule.category)
}

/// Assigns a category to every session from its app identity.
pub fn classify_sessions(sessions: &mut [Session], rules: &[AppRule]) {
    for session in sessions {
        session.category = classify(&session.app_pkg_name, rules);
    }
}

/// End-of-day self-report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualInputs {
    /// The focused-study check (the mandatory one when configured so).
    pub study_done: bool,
    pub diet_followed: bool,
    pub sugar_avoided: bool,
}

/// Tunable thresholds for daily evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyConfig {
    /// Work time goal in seconds.
    pub work_goal_sec: i64,
    /// Distraction budget compatible with a green day.
    pub distraction_limit_green_sec: i64,
    /// Distraction ceiling; exceeding it forces a red day.
    pub distraction_limit_red_sec: i64,
    /// Whether an unmet study check forces a red day.
    pub study_mandatory: bool,
    /// Gap threshold for sessionization, in seconds.
    pub session_gap_sec: i64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            work_goal_sec: 4 * 3600,
            distraction_limit_green_sec: 30 * 60,
            distraction_limit_red_sec: 2 * 3600,
            study_mandatory: true,
            session_gap_sec: 90,
        }
    }
}

impl DailyConfig {
    /// Validates threshold invariants: all values non-negative, red ≥ green.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("work_goal_sec", self.work_goal_sec),
            ("distraction_limit_green_sec", self.distraction_limit_green_sec),
            ("distraction_limit_red_sec", self.distraction_limit_red_sec),
            ("session_gap_sec", self.session_gap_sec),
        ] {
            if value < 0 {
                return Err(ValidationError::Negative { field, value });
            }
        }
        if self.distraction_limit_red_sec < self.distraction_limit_green_sec {
            return Err(ValidationError::LimitOrder {
                green: self.distraction_limit_green_sec,
                red: self.distraction_limit_red_sec,
            });
        }
        Ok(())
    }
}

/// Aggregated work and distraction time for a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTotals {
    pub total_work_sec: i64,
    pub total_distraction_sec: i64,
}

/// Sums session durations per category.
#[must_use]
pub fn day_totals(sessions: &[Session]) -> DayTotals {
    let mut totals = DayTotals::default();
    for session in sessions {
        match session.category {
            Category::Work => totals.total_work_sec += session.duration_sec(),
            Category::Distraction => totals.total_distraction_sec += session.duration_sec(),
            Category::Neutral => {}
        }
    }
    totals
}

/// Evaluates a day's sessions and self-report into a verdict.
///
/// Rules apply in a fixed order and the first match wins; the order is a
/// deliberate tie-break. Excessive distraction and a missed mandatory check
/// both override an otherwise-qualifying green day.
#[must_use]
pub fn evaluate_day(sessions: &[Session], inputs: &ManualInputs, config: &DailyConfig) -> Verdict {
    let totals = day_totals(sessions);

    if totals.total_distraction_sec > config.distraction_limit_red_sec {
        return Verdict::Red;
    }
    if config.study_mandatory && !inputs.study_done {
        return Verdict::Red;
    }
    if totals.total_work_sec >= config.work_goal_sec
        && totals.total_distraction_sec <= config.distraction_limit_green_sec
    {
        return Verdict::Green;
    }
    Verdict::Yellow
}

/// Today's restriction policy, consumed by the OS-side enforcement layer.
///
/// The default is the unrestricted state, used when there is no verdict to
/// derive from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementState {
    pub block_non_essential: bool,
    pub strict_mode: bool,
}

/// Maps yesterday's verdict to today's enforcement configuration.
///
/// Pure and total: red blocks non-essential apps under strict mode, yellow
/// keeps strict mode only, green lifts both.
#[must_use]
pub const fn determine_consequences(previous: Verdict) -> EnforcementState {
    match previous {
        Verdict::Red => EnforcementState {
            block_non_essential: true,
            strict_mode: true,
        },
        Verdict::Yellow => EnforcementState {
            block_non_essential: false,
            strict_mode: true,
        },
        Verdict::Green => EnforcementState {
            block_non_essential: false,
            strict_mode: false,
        },
    }
}
