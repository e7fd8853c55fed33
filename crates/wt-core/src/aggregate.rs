//! Time-series aggregation over the key-value store.
//!
//! `accumulate` is the single write path for recorded session time. It
//! is one read-modify-write unit: load, mutate, prune, persist. Under
//! the process's cooperative scheduling nothing can observe a torn
//! bucket, because no suspension point exists inside the unit.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::domain::Domain;
use crate::host::{KeyValueStore, StoreError, get_typed, set_typed};
use crate::model::{KEY_TIME_DATA, TimeData};

/// Rolling retention window, inclusive of today.
pub const RETENTION_DAYS: i64 = 30;

/// Minimum recordable duration; anything shorter is discarded as noise.
pub const MIN_SESSION_SECS: i64 = 1;

/// Adds `seconds` of recorded time for `domain` to the bucket for
/// `now`'s date and hour, then prunes buckets outside the retention
/// window and persists.
///
/// Durations under one second never mutate stored data. Retention is
/// enforced eagerly on every call rather than by a separate sweep.
pub fn accumulate(
    kv: &dyn KeyValueStore,
    now: NaiveDateTime,
    domain: &Domain,
    seconds: i64,
) -> Result<(), StoreError> {
    if seconds < MIN_SESSION_SECS {
        return Ok(());
    }

    let mut data: TimeData = get_typed(kv, KEY_TIME_DATA)?.unwrap_or_default();

    let date = now.date();
    let hour = now.hour() as usize;

    let bucket = data.0.entry(date).or_default();
    let stat = bucket.domains.entry(domain.clone()).or_default();
    stat.total_time += seconds;
    stat.visit_count += 1;
    stat.hourly_breakdown[hour] += seconds;

    bucket.hourly[hour] += seconds;
    bucket.total_time += seconds;

    let cutoff = date - Duration::days(RETENTION_DAYS);
    data.0.retain(|bucket_date, _| *bucket_date > cutoff);

    set_typed(kv, KEY_TIME_DATA, &data)?;
    tracing::debug!(%domain, seconds, date = %date, hour, "session time recorded");
    Ok(())
}

/// Reads the full current snapshot.
pub fn read(kv: &dyn KeyValueStore) -> Result<TimeData, StoreError> {
    Ok(get_typed(kv, KEY_TIME_DATA)?.unwrap_or_default())
}
