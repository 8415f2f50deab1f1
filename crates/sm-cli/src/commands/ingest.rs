//! Ingest command for recording app focus events.

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use sm_core::RawEvent;
use sm_db::Database;

use crate::commands::util::default_device_id;

pub struct IngestArgs {
    pub app: String,
    pub title: Option<String>,
    pub idle: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub device: Option<String>,
}

/// Records one focus event. Returns false if the event was already
/// present (same id), which only happens on id collision.
pub fn run(db: &mut Database, args: IngestArgs) -> Result<bool> {
    let event = RawEvent {
        id: Uuid::new_v4().to_string(),
        timestamp: args.timestamp.unwrap_or_else(Utc::now),
        device_id: args.device.unwrap_or_else(default_device_id),
        app_pkg_name: args.app,
        window_title: args.title,
        is_idle: args.idle,
    };
    let inserted = db.insert_events(std::slice::from_ref(&event))?;
    tracing::debug!(id = %event.id, app = %event.app_pkg_name, "event ingested");
    Ok(inserted == 1)
}
