//! Web time tracker CLI library.
//!
//! This crate provides the CLI interface for the web time tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, DistractionsAction, LimitsAction};
pub use config::Config;
