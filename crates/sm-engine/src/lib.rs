pub mod pipeline;
pub mod remote;
pub mod sync;

pub use pipeline::{DailyPipeline, PipelineError, PipelineRun, current_enforcement_state, local_day_bounds};
pub use remote::{HttpRemoteStore, RemoteError, RemoteStore};
pub use sync::{APP_RULE_ENTITY, RAW_EVENT_ENTITY, SyncManager, SyncOutcome, SyncStatus};
