//! Report command for daily browsing summaries.
//!
//! This module implements `wt report`, rendering one day's recorded
//! time per domain (human-readable or JSON), with each domain's
//! progress against its configured limit where one exists.

use std::fmt::Write;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use wt_core::host::{KeyValueStore, get_typed};
use wt_core::model::KEY_SITE_LIMITS;
use wt_core::{Domain, SiteLimits, aggregate};

/// One domain's row in the report.
#[derive(Debug, Serialize)]
pub struct DomainReport {
    pub domain: Domain,
    pub seconds: i64,
    pub visits: u32,
    pub limit_minutes: Option<u32>,
    pub percent_of_limit: Option<u32>,
}

/// Computed report data.
#[derive(Debug, Serialize)]
pub struct ReportData {
    pub date: NaiveDate,
    pub total_seconds: i64,
    pub domains: Vec<DomainReport>,
}

/// Builds the report for one date. Domains are ordered by recorded
/// time, busiest first.
pub fn build(kv: &dyn KeyValueStore, date: NaiveDate) -> Result<ReportData> {
    let data = aggregate::read(kv)?;
    let limits: SiteLimits = get_typed(kv, KEY_SITE_LIMITS)?.unwrap_or_default();

    let Some(bucket) = data.bucket(date) else {
        return Ok(ReportData {
            date,
            total_seconds: 0,
            domains: Vec::new(),
        });
    };

    let mut domains: Vec<DomainReport> = bucket
        .domains
        .iter()
        .map(|(domain, stat)| {
            let limit_minutes = limits.get(domain).copied();
            let percent_of_limit = limit_minutes.map(|minutes| {
                let budget_secs = i64::from(minutes) * 60;
                u32::try_from(stat.total_time * 100 / budget_secs.max(1)).unwrap_or(u32::MAX)
            });
            DomainReport {
                domain: domain.clone(),
                seconds: stat.total_time,
                visits: stat.visit_count,
                limit_minutes,
                percent_of_limit,
            }
        })
        .collect();
    domains.sort_by(|a, b| b.seconds.cmp(&a.seconds).then_with(|| a.domain.cmp(&b.domain)));

    Ok(ReportData {
        date,
        total_seconds: bucket.total_time,
        domains,
    })
}

/// Formats seconds as a duration string: "Xh Ym" above an hour, "Xm"
/// below, "<1m" for anything under a minute.
pub fn format_minutes(seconds: i64) -> String {
    if seconds < 60 {
        return "<1m".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m");
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {rest}m")
    }
}

fn render(data: &ReportData) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Browsing report for {}", data.date);
    let _ = writeln!(out, "Total: {}", format_minutes(data.total_seconds));

    if data.domains.is_empty() {
        let _ = writeln!(out, "\nNo browsing recorded.");
        return out;
    }

    let _ = writeln!(out);
    for row in &data.domains {
        let mut line = format!(
            "{:<28} {:>7}  {} visits",
            row.domain,
            format_minutes(row.seconds),
            row.visits
        );
        if let (Some(limit), Some(percent)) = (row.limit_minutes, row.percent_of_limit) {
            let _ = write!(line, "  ({percent}% of {limit}m limit)");
        }
        let _ = writeln!(out, "{line}");
    }
    out
}

pub fn run(kv: &dyn KeyValueStore, date: NaiveDate, json: bool) -> Result<()> {
    let data = build(kv, date)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print!("{}", render(&data));
    }
    Ok(())
}
