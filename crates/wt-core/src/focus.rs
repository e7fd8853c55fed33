//! Focus timer phases.
//!
//! Pure countdown bookkeeping for focus and break sessions. The engine
//! owns the phase, drives the 1 Hz tick, and handles completion; this
//! module only answers "where does the timer stand at instant `now`".

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FOCUS_SECS: i64 = 25 * 60;
pub const DEFAULT_BREAK_SECS: i64 = 5 * 60;

/// The timer's phase. `end_time` is an absolute instant so drift in
/// tick delivery never shortens or lengthens the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusPhase {
    #[default]
    Idle,
    Running {
        is_break: bool,
        end_time: NaiveDateTime,
    },
}

impl FocusPhase {
    pub fn start_focus(now: NaiveDateTime, duration_secs: Option<i64>) -> Self {
        Self::Running {
            is_break: false,
            end_time: now + chrono::Duration::seconds(duration_secs.unwrap_or(DEFAULT_FOCUS_SECS)),
        }
    }

    pub fn start_break(now: NaiveDateTime, duration_secs: Option<i64>) -> Self {
        Self::Running {
            is_break: true,
            end_time: now + chrono::Duration::seconds(duration_secs.unwrap_or(DEFAULT_BREAK_SECS)),
        }
    }

    /// Whether the running session's deadline has passed.
    pub fn is_complete(&self, now: NaiveDateTime) -> bool {
        match self {
            Self::Idle => false,
            Self::Running { end_time, .. } => now >= *end_time,
        }
    }

    /// Snapshot for broadcasting and persistence.
    pub fn state(&self, now: NaiveDateTime) -> FocusState {
        match *self {
            Self::Idle => FocusState::default(),
            Self::Running { is_break, end_time } => {
                // Ceiling of the remaining time, so a session started at
                // 25:00 reports 1500 for its whole first second rather
                // than dropping straight to 1499.
                let remaining_ms = (end_time - now).num_milliseconds().max(0);
                FocusState {
                    time_left: (remaining_ms + 999) / 1000,
                    is_running: true,
                    is_break,
                    end_time: Some(end_time),
                }
            }
        }
    }
}

/// The broadcast/persisted view of the timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusState {
    pub time_left: i64,
    pub is_running: bool,
    pub is_break: bool,
    pub end_time: Option<NaiveDateTime>,
}
