//! Persisted data shapes.
//!
//! # Storage layout
//!
//! Everything lives in the external key-value store as JSON under four
//! keys:
//!
//! - `time_data` — date → [`DailyBucket`] map ([`TimeData`])
//! - `site_limits` — domain → minutes budget ([`SiteLimits`])
//! - `distracting_sites` — domains blocked during focus sessions
//! - `focus_state` — the focus timer's persisted snapshot
//!
//! Time totals are integral seconds; sub-second noise is discarded
//! before it reaches this layer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;

pub const KEY_TIME_DATA: &str = "time_data";
pub const KEY_SITE_LIMITS: &str = "site_limits";
pub const KEY_DISTRACTING_SITES: &str = "distracting_sites";
pub const KEY_FOCUS_STATE: &str = "focus_state";

/// Per-domain totals for one calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStat {
    /// Total recorded seconds.
    pub total_time: i64,
    /// Number of recorded sessions.
    pub visit_count: u32,
    /// Seconds per local wall-clock hour.
    pub hourly_breakdown: [i64; 24],
}

/// Aggregates for one calendar date.
///
/// Invariants (maintained by `aggregate::accumulate`, checked in its
/// tests): `total_time` equals the sum of the domains' `total_time`,
/// and `hourly[h]` equals the sum of the domains' `hourly_breakdown[h]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub domains: BTreeMap<Domain, DomainStat>,
    pub hourly: [i64; 24],
    pub total_time: i64,
}

/// The full time series: calendar date → daily bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeData(pub BTreeMap<NaiveDate, DailyBucket>);

impl TimeData {
    /// Total recorded seconds for a domain on a date.
    pub fn domain_seconds(&self, date: NaiveDate, domain: &Domain) -> i64 {
        self.0
            .get(&date)
            .and_then(|bucket| bucket.domains.get(domain))
            .map_or(0, |stat| stat.total_time)
    }

    /// The bucket for a date, if any time was recorded.
    pub fn bucket(&self, date: NaiveDate) -> Option<&DailyBucket> {
        self.0.get(&date)
    }
}

/// Domain → daily budget in minutes. Externally configured; read-only
/// to the core.
pub type SiteLimits = BTreeMap<Domain, u32>;

/// The user-chosen set of domains to block during focus sessions.
pub type DistractingSites = BTreeSet<Domain>;

/// Focus timer snapshot persisted across process restarts so a UI can
/// show the timer without the engine present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusStateRecord {
    pub time_left: i64,
    pub is_running: bool,
    pub is_break: bool,
    pub end_time: Option<NaiveDateTime>,
}
