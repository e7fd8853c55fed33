//! CLI subcommand implementations.

pub mod distractions;
pub mod limits;
pub mod report;
pub mod run;
