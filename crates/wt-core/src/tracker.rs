//! Session lifecycle state machine.
//!
//! Converts the host's tab/window activity stream into discrete,
//! non-overlapping timed sessions per domain. The transition function
//! is pure — `(state, event, now) -> (state, effects)` — so the
//! machine is testable without a host or a scheduler; the engine
//! applies the effects and the runtime owns the timers.
//!
//! Flushing finalizes a session's elapsed time without ending its
//! logical continuation: `started_at` resets to "now" so the next
//! computation measures only the un-flushed remainder. A flush with no
//! open session is a no-op, which also guards re-entrant finalization.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{self, Domain};

/// Backup flush cadence for long-running sessions.
pub const FLUSH_INTERVAL_SECS: u64 = 60;
/// Debounced flush delay after a successful accumulate.
pub const FLUSH_DEBOUNCE_SECS: u64 = 5;

/// A host tab, identified by tab ID and URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: i64,
    pub url: String,
}

/// Inbound activity, as delivered by the host adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    /// The active tab changed, or its URL changed in place.
    TabChanged(TabInfo),
    /// The browser window lost focus.
    WindowFocusLost,
    /// The browser window regained focus.
    WindowFocusGained,
    /// Periodic reconciliation: the host's actual active tab right now.
    /// Corrects for any activity event the tracker missed.
    Reconcile(Option<TabInfo>),
    /// Periodic or debounced flush tick.
    Flush,
    /// Process startup; any carried-over session state is stale.
    Startup(Option<TabInfo>),
}

/// The currently open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub tab: TabInfo,
    pub domain: Domain,
    pub started_at: NaiveDateTime,
    /// Set only while the containing window is inactive.
    pub paused_at: Option<NaiveDateTime>,
}

impl OpenSession {
    /// Elapsed un-flushed seconds: `(paused_at ?? now) - started_at`.
    fn elapsed_secs(&self, now: NaiveDateTime) -> i64 {
        (self.paused_at.unwrap_or(now) - self.started_at).num_seconds()
    }
}

/// At most one session is open at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Idle,
    Active(OpenSession),
    Paused(OpenSession),
}

impl TrackerState {
    fn into_session(self) -> Option<OpenSession> {
        match self {
            Self::Idle => None,
            Self::Active(session) | Self::Paused(session) => Some(session),
        }
    }

    fn session(&self) -> Option<&OpenSession> {
        match self {
            Self::Idle => None,
            Self::Active(session) | Self::Paused(session) => Some(session),
        }
    }
}

/// Side effects for the engine to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Record finalized session time.
    Accumulate { domain: Domain, seconds: i64 },
    /// Evaluate the domain's budget without recording time (tab-change
    /// pre-check; accumulation paths evaluate on their own).
    CheckLimit { domain: Domain },
}

/// Finalizes the session and returns the accumulate effect, if the
/// elapsed time is worth recording.
fn finalize(session: &OpenSession, now: NaiveDateTime) -> Option<Effect> {
    let seconds = session.elapsed_secs(now);
    (seconds >= 1).then(|| Effect::Accumulate {
        domain: session.domain.clone(),
        seconds,
    })
}

fn start_session(tab: TabInfo, now: NaiveDateTime, effects: &mut Vec<Effect>) -> TrackerState {
    match domain::extract(&tab.url) {
        Ok(Some(domain)) => {
            effects.push(Effect::CheckLimit {
                domain: domain.clone(),
            });
            TrackerState::Active(OpenSession {
                tab,
                domain,
                started_at: now,
                paused_at: None,
            })
        }
        // Internal scheme or unparsable URL: nothing to track.
        Ok(None) | Err(_) => TrackerState::Idle,
    }
}

/// The transition function.
pub fn step(
    state: TrackerState,
    event: &ActivityEvent,
    now: NaiveDateTime,
) -> (TrackerState, Vec<Effect>) {
    let mut effects = Vec::new();

    let next = match event {
        ActivityEvent::TabChanged(tab) => {
            if let Some(session) = state.into_session() {
                effects.extend(finalize(&session, now));
            }
            start_session(tab.clone(), now, &mut effects)
        }

        ActivityEvent::WindowFocusLost => match state {
            TrackerState::Active(session) => {
                // Flush now so nothing is lost if the window never
                // regains focus; started_at advances to the pause
                // instant so the flushed interval is not recounted.
                effects.extend(finalize(&session, now));
                TrackerState::Paused(OpenSession {
                    started_at: now,
                    paused_at: Some(now),
                    ..session
                })
            }
            other => other,
        },

        ActivityEvent::WindowFocusGained => match state {
            TrackerState::Paused(session) => {
                let paused_for = session
                    .paused_at
                    .map_or_else(chrono::Duration::zero, |paused_at| now - paused_at);
                TrackerState::Active(OpenSession {
                    started_at: session.started_at + paused_for,
                    paused_at: None,
                    ..session
                })
            }
            other => other,
        },

        ActivityEvent::Reconcile(current) => match current {
            Some(tab) if state.session().is_none_or(|s| s.tab != *tab) => {
                return step(state, &ActivityEvent::TabChanged(tab.clone()), now);
            }
            _ => state,
        },

        ActivityEvent::Flush => match state {
            TrackerState::Active(session) => {
                if let Some(effect) = finalize(&session, now) {
                    effects.push(effect);
                    TrackerState::Active(OpenSession {
                        started_at: now,
                        ..session
                    })
                } else {
                    // sub-second remainder: keep measuring from the
                    // same origin instead of dropping it
                    TrackerState::Active(session)
                }
            }
            other => other,
        },

        ActivityEvent::Startup(tab) => {
            // Whatever we were tracking predates this process; its
            // elapsed time cannot be trusted, so it is discarded.
            match tab {
                Some(tab) => start_session(tab.clone(), now, &mut effects),
                None => TrackerState::Idle,
            }
        }
    };

    (next, effects)
}
