//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Web time tracker.
///
/// Tracks active browsing time per domain, enforces daily site limits,
/// and runs focus sessions that block distracting sites.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the tracker, reading host messages from stdin.
    Run {
        /// Keep all state in memory instead of the database.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Show a daily browsing report.
    Report {
        /// Report date (defaults to today).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage daily site limits.
    Limits {
        #[command(subcommand)]
        action: LimitsAction,
    },

    /// Manage the distracting-sites list used by focus mode.
    Distractions {
        #[command(subcommand)]
        action: DistractionsAction,
    },
}

/// Operations on daily site limits.
#[derive(Debug, Subcommand)]
pub enum LimitsAction {
    /// List configured limits.
    List,

    /// Set a domain's daily limit.
    Set {
        /// Domain to limit (e.g. example.com).
        domain: String,

        /// Daily budget in minutes.
        minutes: u32,
    },

    /// Remove a domain's limit.
    Remove {
        /// Domain whose limit to remove.
        domain: String,
    },
}

/// Operations on the distracting-sites list.
#[derive(Debug, Subcommand)]
pub enum DistractionsAction {
    /// List distracting sites.
    List,

    /// Add a domain to the list.
    Add {
        /// Domain to add (e.g. example.com).
        domain: String,
    },

    /// Remove a domain from the list.
    Remove {
        /// Domain to remove.
        domain: String,
    },
}
