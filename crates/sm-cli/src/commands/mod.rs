//! CLI subcommand implementations.

pub mod classify;
pub mod enforcement;
pub mod ingest;
pub mod manual;
pub mod pipeline;
pub mod rules;
pub mod status;
pub mod sync;
pub mod util;
