//! Core domain logic for the self-monitor.
//!
//! This crate contains the fundamental types and logic for:
//! - Sessionization: clustering raw focus events into contiguous sessions
//! - Rules: classifying app identities and evaluating a day into a verdict
//! - Enforcement: deriving today's restriction policy from yesterday's verdict

pub mod daily;
pub mod event;
pub mod rules;
pub mod session;
pub mod types;

pub use daily::DailyLog;
pub use event::RawEvent;
pub use rules::{
    AppRule, DailyConfig, DayTotals, EnforcementState, ManualInputs, PatternMatcher, classify,
    classify_sessions, classify_with, day_totals, determine_consequences, evaluate_day,
};
pub use session::{Session, sessionize};
pub use types::{Category, ValidationError, Verdict};
