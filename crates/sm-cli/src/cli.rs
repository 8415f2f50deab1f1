//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

/// Behavioral self-monitor.
///
/// Records app focus events, clusters them into sessions, and evaluates
/// each day into a verdict that drives the next day's restrictions.
#[derive(Debug, Parser)]
#[command(name = "sm", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record an app focus event.
    Ingest {
        /// App or package identity (e.g., com.twitter.android).
        #[arg(long)]
        app: String,

        /// Window title, if the platform exposes one.
        #[arg(long)]
        title: Option<String>,

        /// Mark the sample as idle time.
        #[arg(long)]
        idle: bool,

        /// Event time (RFC 3339); defaults to now. Used for backfill.
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,

        /// Device identity; defaults to this machine's hostname.
        #[arg(long)]
        device: Option<String>,
    },

    /// Show how an app identity would be classified.
    Classify {
        /// App or package identity.
        app: String,
    },

    /// Show today's totals, verdict preview, and sync state.
    Status {
        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Record the daily self-report.
    Manual {
        /// Date the report is for; defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Study obligation was completed.
        #[arg(long)]
        study: bool,

        /// Diet was followed.
        #[arg(long)]
        diet: bool,

        /// Sugar was avoided.
        #[arg(long)]
        sugar: bool,
    },

    /// Manage classification rules.
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Evaluate a day and persist its log.
    Pipeline {
        /// Date to evaluate; defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Run a sync cycle against the remote.
    Sync,

    /// Show the restriction policy in force today.
    Enforcement {
        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// Rule management actions.
#[derive(Debug, Subcommand)]
pub enum RulesAction {
    /// List all rules.
    List {
        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Create or replace a rule.
    Set {
        /// Pattern the rule matches (exact identity or glob).
        pattern: String,

        /// Category: work, distraction, or neutral.
        category: String,
    },
}
