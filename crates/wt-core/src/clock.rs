//! Injectable wall-clock time source.
//!
//! The tracker's semantics are keyed to local wall-clock time (dates and
//! hour buckets follow the user's day, not UTC), so the clock hands out
//! `NaiveDateTime` in local time. Injecting it lets tests advance
//! virtual time deterministically instead of sleeping.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{Duration, Local, NaiveDateTime};

/// A source of "now" in local wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// The real local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A manually advanced clock for tests.
///
/// Clones share the same underlying instant, so a test can hold one
/// handle while the component under test holds another.
#[derive(Debug, Clone)]
pub struct ManualClock(Rc<Cell<NaiveDateTime>>);

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    /// Moves the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.0.set(self.0.get() + Duration::seconds(secs));
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, instant: NaiveDateTime) {
        self.0.set(instant);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.0.get()
    }
}
