//! Time-gap clustering of raw focus events into contiguous sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::RawEvent;
use crate::types::Category;

/// A maximal contiguous interval of focus on one application.
///
/// Sessions are derived values: they are recomputed from raw events on every
/// pipeline run and carry no persisted identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// App identity the whole session belongs to.
    pub app_pkg_name: String,
    /// Timestamp of the first event in the session.
    pub start: DateTime<Utc>,
    /// Timestamp of the last event in the session.
    pub end: DateTime<Utc>,
    /// Behavioral category, [`Category::Neutral`] until a classification pass
    /// assigns one.
    #[serde(default)]
    pub category: Category,
}

impl Session {
    /// Session length in whole seconds (truncated).
    #[must_use]
    pub fn duration_sec(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Groups events into contiguous sessions by time gap and app identity.
///
/// Events are stably sorted by timestamp first, so callers may pass them in
/// any order. A session breaks when the gap to the previous event exceeds
/// `gap_threshold` or the app identity changes. Sealed sessions shorter than
/// one whole second are discarded.
///
/// Categories are left at [`Category::Neutral`]; classification is a separate
/// pass over the session's app identity (see [`crate::rules::classify_sessions`]).
#[must_use]
pub fn sessionize(events: &[RawEvent], gap_threshold: Duration) -> Vec<Session> {
    let mut ordered: Vec<&RawEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.timestamp);

    let mut sessions = Vec::new();
    let mut iter = ordered.into_iter();
    let Some(first) = iter.next() else {
        return sessions;
    };

    let mut current_start = first;
    let mut last = first;
    for event in iter {
        let gap = event.timestamp - last.timestamp;
        if gap > gap_threshold || event.app_pkg_name != current_start.app_pkg_name {
            seal(&mut sessions, current_start, last);
            current_start = event;
        }
        last = event;
    }
    seal(&mut sessions, current_start, last);

    tracing::debug!(
        events = events.len(),
        sessions = sessions.len(),
        "sessionized events"
    );
    sessions
}

/// Seals `[start, end]` as a session, discarding zero-length ones.
fn seal(sessions: &mut Vec<Session>, start: &RawEvent, end: &RawEvent) {
    let duration = (end.timestamp - start.timestamp).num_seconds();
    if duration <= 0 {
        return;
    }
    sessions.push(Session {
        app_pkg_name: start.app_pkg_name.clone(),
        start: start.timestamp,
        end: end.timestamp,
        category: Category::Neutral,
    });
}
