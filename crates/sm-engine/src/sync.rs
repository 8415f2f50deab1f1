//! Offline-first reconciliation between the local store and the remote.
//!
//! The device is the source of truth for raw events; the remote is the
//! source of truth for classification rules. A sync cycle pushes local
//! events past the push watermark, then pulls rule changes since the
//! pull watermark. Any failure leaves the local store untouched beyond
//! what already succeeded, and the next cycle picks up from the
//! persisted cursors.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use sm_db::{Database, DbError};

use crate::remote::{RemoteError, RemoteStore};

/// Cursor entity for outbound raw events.
pub const RAW_EVENT_ENTITY: &str = "raw_event";
/// Cursor entity for inbound classification rules.
pub const APP_RULE_ENTITY: &str = "app_rule";

/// `system_config` key holding the human-readable sync status line.
const SYNC_STATUS_KEY: &str = "sync_status";

/// Live state of the sync manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Pushing,
    Pulling,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pushing => "pushing",
            Self::Pulling => "pulling",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a sync attempt amounted to. `sync_now` never returns `Err`;
/// callers that merely fire a background cycle can ignore the outcome,
/// while the CLI surfaces it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A full cycle ran.
    Completed { pushed: usize, pulled: usize },
    /// Another cycle was already in flight; nothing was touched.
    Busy,
    /// No remote is configured; nothing was touched.
    Disabled,
    /// The reachability probe failed; nothing was transferred.
    Offline,
    /// A transfer phase failed partway through.
    Failed(String),
}

#[derive(Debug, Error)]
enum SyncError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Serializes sync cycles and owns the database handle they run against.
///
/// Exactly one cycle runs at a time; a `sync_now` call that finds another
/// cycle in flight returns [`SyncOutcome::Busy`] immediately instead of
/// queueing.
pub struct SyncManager<R> {
    db: tokio::sync::Mutex<Database>,
    remote: Option<R>,
    status: Mutex<SyncStatus>,
}

impl<R> SyncManager<R>
where
    R: RemoteStore + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(db: Database, remote: Option<R>) -> Self {
        Self {
            db: tokio::sync::Mutex::new(db),
            remote,
            status: Mutex::new(SyncStatus::Idle),
        }
    }

    /// Current status. Reports `Error` if the status lock is poisoned,
    /// which can only happen after a panic in a sync cycle.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.lock().map_or(SyncStatus::Error, |guard| *guard)
    }

    /// Runs one sync cycle to completion.
    pub async fn sync_now(&self) -> SyncOutcome {
        let Some(remote) = self.remote.as_ref() else {
            tracing::info!("sync disabled: no remote configured");
            self.record_status_text("disabled: no remote configured").await;
            return SyncOutcome::Disabled;
        };

        // Atomic idle -> pushing transition is the single-flight guard.
        if !self.begin() {
            tracing::debug!("sync already in flight, dropping request");
            return SyncOutcome::Busy;
        }

        if let Err(err) = remote.ping().await {
            tracing::info!(error = %err, "remote unreachable, staying offline");
            self.store_status(SyncStatus::Idle);
            self.record_status_text("offline: remote unreachable").await;
            return SyncOutcome::Offline;
        }

        match self.run_phases(remote).await {
            Ok((pushed, pulled)) => {
                self.store_status(SyncStatus::Idle);
                let text = format!(
                    "ok: pushed {pushed}, pulled {pulled} at {}",
                    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
                );
                self.record_status_text(&text).await;
                tracing::info!(pushed, pulled, "sync cycle completed");
                SyncOutcome::Completed { pushed, pulled }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sync cycle failed");
                self.store_status(SyncStatus::Error);
                self.record_status_text(&format!("failed: {err}")).await;
                // Error status is a report, not a latch: the next cycle
                // may run as soon as this one has been recorded.
                self.store_status(SyncStatus::Idle);
                SyncOutcome::Failed(err.to_string())
            }
        }
    }

    /// Spawns a sync cycle on the runtime and returns its handle.
    ///
    /// Callers are free to drop the handle; the cycle finishes either way.
    pub fn trigger(self: &Arc<Self>) -> tokio::task::JoinHandle<SyncOutcome> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.sync_now().await })
    }

    async fn run_phases(&self, remote: &R) -> Result<(usize, usize), SyncError> {
        // Push before pull so a cycle never classifies events the remote
        // has not seen yet.
        let pushed = {
            let db = self.db.lock().await;
            let mark = db
                .sync_state(RAW_EVENT_ENTITY)?
                .and_then(|state| state.last_pushed_at)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            let pending = db.events_after(mark)?;
            if pending.is_empty() {
                0
            } else {
                remote.push_events(&pending).await?;
                db.advance_push_cursor(RAW_EVENT_ENTITY, Utc::now())?;
                pending.len()
            }
        };

        self.store_status(SyncStatus::Pulling);
        let pulled = {
            let db = self.db.lock().await;
            let since = db
                .sync_state(APP_RULE_ENTITY)?
                .and_then(|state| state.last_pulled_at)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            let rules = remote.pull_rules(since).await?;
            for rule in &rules {
                db.upsert_rule(rule)?;
            }
            db.advance_pull_cursor(APP_RULE_ENTITY, Utc::now())?;
            rules.len()
        };

        Ok((pushed, pulled))
    }

    fn begin(&self) -> bool {
        match self.status.lock() {
            Ok(mut guard) if *guard == SyncStatus::Idle => {
                *guard = SyncStatus::Pushing;
                true
            }
            _ => false,
        }
    }

    fn store_status(&self, status: SyncStatus) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = status;
        }
    }

    async fn record_status_text(&self, text: &str) {
        let db = self.db.lock().await;
        if let Err(err) = db.set_config(SYNC_STATUS_KEY, text) {
            tracing::warn!(error = %err, "failed to record sync status");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::path::Path;

    use chrono::TimeZone;
    use sm_core::{AppRule, Category, RawEvent};
    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct RemoteState {
        events: HashMap<String, RawEvent>,
        rules: Vec<AppRule>,
        push_calls: usize,
        fail_pull: bool,
        offline: bool,
    }

    #[derive(Clone, Default)]
    struct MockRemote {
        state: Arc<Mutex<RemoteState>>,
        push_gate: Option<Arc<tokio::sync::Notify>>,
    }

    impl MockRemote {
        fn state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
            self.state.lock().unwrap()
        }
    }

    impl RemoteStore for MockRemote {
        fn ping(&self) -> impl Future<Output = Result<(), RemoteError>> + Send {
            async move {
                if self.state().offline {
                    return Err(RemoteError::Api {
                        message: "unreachable".into(),
                    });
                }
                Ok(())
            }
        }

        fn push_events(&self, events: &[RawEvent]) -> impl Future<Output = Result<(), RemoteError>> + Send {
            async move {
                if let Some(gate) = &self.push_gate {
                    gate.notified().await;
                }
                let mut state = self.state();
                state.push_calls += 1;
                for event in events {
                    state.events.insert(event.id.clone(), event.clone());
                }
                Ok(())
            }
        }

        fn pull_rules(&self, _since: DateTime<Utc>) -> impl Future<Output = Result<Vec<AppRule>, RemoteError>> + Send {
            async move {
                let state = self.state();
                if state.fail_pull {
                    return Err(RemoteError::Api {
                        message: "rules endpoint down".into(),
                    });
                }
                Ok(state.rules.clone())
            }
        }
    }

    fn open(path: &Path) -> Database {
        Database::open(path).unwrap()
    }

    fn sample_event(id: &str, device_id: &str, minute: u32) -> RawEvent {
        RawEvent {
            id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 5, 9, minute, 0).unwrap(),
            device_id: device_id.to_string(),
            app_pkg_name: "com.example.editor".to_string(),
            window_title: None,
            is_idle: false,
        }
    }

    fn seed_events(path: &Path, device_id: &str, ids: &[&str]) {
        let mut db = open(path);
        let events: Vec<RawEvent> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| sample_event(id, device_id, u32::try_from(i).unwrap()))
            .collect();
        db.insert_events(&events).unwrap();
    }

    #[tokio::test]
    async fn disabled_without_remote() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sm.db");
        let manager = SyncManager::<MockRemote>::new(open(&path), None);

        let outcome = manager.sync_now().await;

        assert_eq!(outcome, SyncOutcome::Disabled);
        assert_eq!(manager.status(), SyncStatus::Idle);
        let db = open(&path);
        let text = db.get_config("sync_status").unwrap().unwrap();
        assert!(text.starts_with("disabled"));
        assert!(db.sync_state(RAW_EVENT_ENTITY).unwrap().is_none());
    }

    #[tokio::test]
    async fn pushes_new_events_and_pulls_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sm.db");
        seed_events(&path, "laptop", &["e1", "e2"]);

        let remote = MockRemote::default();
        remote.state().rules.push(AppRule {
            pkg_name_pattern: "com.example.editor".to_string(),
            category: Category::Work,
        });
        let manager = SyncManager::new(open(&path), Some(remote.clone()));

        let outcome = manager.sync_now().await;

        assert_eq!(outcome, SyncOutcome::Completed { pushed: 2, pulled: 1 });
        assert_eq!(remote.state().events.len(), 2);

        let db = open(&path);
        assert_eq!(db.list_rules().unwrap().len(), 1);
        assert_eq!(db.pending_push_count(RAW_EVENT_ENTITY).unwrap(), 0);
        assert!(db.sync_state(RAW_EVENT_ENTITY).unwrap().unwrap().last_pushed_at.is_some());
        assert!(db.sync_state(APP_RULE_ENTITY).unwrap().unwrap().last_pulled_at.is_some());
        let text = db.get_config("sync_status").unwrap().unwrap();
        assert!(text.starts_with("ok:"), "unexpected status text: {text}");
    }

    #[tokio::test]
    async fn second_cycle_skips_push_when_nothing_pending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sm.db");
        seed_events(&path, "laptop", &["e1"]);

        let remote = MockRemote::default();
        let manager = SyncManager::new(open(&path), Some(remote.clone()));

        manager.sync_now().await;
        let outcome = manager.sync_now().await;

        assert!(matches!(outcome, SyncOutcome::Completed { pushed: 0, .. }));
        // An empty batch never reaches the network.
        assert_eq!(remote.state().push_calls, 1);
    }

    #[tokio::test]
    async fn resent_batches_are_idempotent_on_remote() {
        let dir = TempDir::new().unwrap();
        let path_a = dir.path().join("a.db");
        let path_b = dir.path().join("b.db");
        // Two devices captured the same events, e.g. after a restore.
        seed_events(&path_a, "laptop", &["e1", "e2"]);
        seed_events(&path_b, "laptop", &["e1", "e2"]);

        let remote = MockRemote::default();
        let manager_a = SyncManager::new(open(&path_a), Some(remote.clone()));
        let manager_b = SyncManager::new(open(&path_b), Some(remote.clone()));

        manager_a.sync_now().await;
        manager_b.sync_now().await;

        let state = remote.state();
        assert_eq!(state.push_calls, 2);
        assert_eq!(state.events.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_cycle_is_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sm.db");
        seed_events(&path, "laptop", &["e1"]);

        let gate = Arc::new(tokio::sync::Notify::new());
        let remote = MockRemote {
            push_gate: Some(Arc::clone(&gate)),
            ..MockRemote::default()
        };
        let manager = Arc::new(SyncManager::new(open(&path), Some(remote.clone())));

        let first = manager.trigger();
        while manager.status() == SyncStatus::Idle {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let outcome = manager.sync_now().await;
        assert_eq!(outcome, SyncOutcome::Busy);
        assert_eq!(remote.state().push_calls, 0);
        let db = open(&path);
        assert!(db.sync_state(RAW_EVENT_ENTITY).unwrap().is_none());

        gate.notify_one();
        let first_outcome = first.await.unwrap();
        assert_eq!(first_outcome, SyncOutcome::Completed { pushed: 1, pulled: 0 });
    }

    #[tokio::test]
    async fn failed_pull_keeps_push_progress_and_recovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sm.db");
        seed_events(&path, "laptop", &["e1", "e2"]);

        let remote = MockRemote::default();
        remote.state().fail_pull = true;
        let manager = SyncManager::new(open(&path), Some(remote.clone()));

        let outcome = manager.sync_now().await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert_eq!(manager.status(), SyncStatus::Idle);

        {
            let db = open(&path);
            // Push completed before the pull failed, so its cursor moved
            // and the pull cursor did not.
            assert!(db.sync_state(RAW_EVENT_ENTITY).unwrap().unwrap().last_pushed_at.is_some());
            assert!(db.sync_state(APP_RULE_ENTITY).unwrap().is_none());
            let text = db.get_config("sync_status").unwrap().unwrap();
            assert!(text.starts_with("failed"), "unexpected status text: {text}");
        }

        remote.state().fail_pull = false;
        let outcome = manager.sync_now().await;
        assert_eq!(outcome, SyncOutcome::Completed { pushed: 0, pulled: 0 });
        // Events are not re-pushed after recovery.
        assert_eq!(remote.state().push_calls, 1);
    }

    #[tokio::test]
    async fn offline_probe_short_circuits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sm.db");
        seed_events(&path, "laptop", &["e1"]);

        let remote = MockRemote::default();
        remote.state().offline = true;
        let manager = SyncManager::new(open(&path), Some(remote.clone()));

        let outcome = manager.sync_now().await;

        assert_eq!(outcome, SyncOutcome::Offline);
        assert_eq!(manager.status(), SyncStatus::Idle);
        assert_eq!(remote.state().push_calls, 0);
        let db = open(&path);
        assert!(db.sync_state(RAW_EVENT_ENTITY).unwrap().is_none());
        let text = db.get_config("sync_status").unwrap().unwrap();
        assert!(text.starts_with("offline"));
    }
}
