//! Self-monitor CLI library.
//!
//! This crate provides the CLI interface for the self-monitor.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, RulesAction};
pub use config::Config;
