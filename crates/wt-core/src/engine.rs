//! Engine: wires the tracker, aggregation, limits and the focus timer
//! to the injected collaborators.
//!
//! The engine is synchronous and single-threaded. The runtime feeds it
//! activity events, focus requests and ticks; the engine returns
//! [`Directive`]s telling the runtime which timers to (re)arm. Timer
//! ownership stays entirely in the runtime, so the engine remains
//! testable with a manual clock and no scheduler.

use std::mem;

use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::clock::Clock;
use crate::domain::Domain;
use crate::focus::{FocusPhase, FocusState};
use crate::host::{FocusBus, KeyValueStore, Notifier, get_typed, set_typed};
use crate::limits::LimitEvaluator;
use crate::model::{
    DistractingSites, FocusStateRecord, KEY_DISTRACTING_SITES, KEY_FOCUS_STATE,
};
use crate::rules::RuleSynthesizer;
use crate::tracker::{ActivityEvent, Effect, FLUSH_DEBOUNCE_SECS, TrackerState, step};

/// Timer instructions for the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// (Re)arm the debounced flush; a pending one is replaced.
    ScheduleFlush { delay_secs: u64 },
    /// Start delivering 1 Hz focus ticks.
    StartTicking,
    /// Stop delivering focus ticks.
    StopTicking,
}

/// Focus-timer commands, as delivered by the host adapter or CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FocusRequest {
    StartFocus { duration_secs: Option<i64> },
    StartBreak { duration_secs: Option<i64> },
    StopFocus,
    BlockDistractions { sites: Vec<Domain> },
    UnblockDistractions,
    QueryState,
}

pub struct Engine<C: Clock> {
    clock: C,
    kv: Box<dyn KeyValueStore>,
    rules: RuleSynthesizer,
    notifier: Box<dyn Notifier>,
    bus: Box<dyn FocusBus>,
    evaluator: LimitEvaluator,
    tracker: TrackerState,
    focus: FocusPhase,
}

impl<C: Clock> Engine<C> {
    pub fn new(
        clock: C,
        kv: Box<dyn KeyValueStore>,
        rules: RuleSynthesizer,
        notifier: Box<dyn Notifier>,
        bus: Box<dyn FocusBus>,
    ) -> Self {
        Self {
            clock,
            kv,
            rules,
            notifier,
            bus,
            evaluator: LimitEvaluator::new(),
            tracker: TrackerState::default(),
            focus: FocusPhase::Idle,
        }
    }

    /// Restores a persisted focus session after a restart. A session
    /// whose deadline already passed is completed quietly.
    pub fn resume(&mut self) -> Vec<Directive> {
        let record: Option<FocusStateRecord> = match get_typed(self.kv.as_ref(), KEY_FOCUS_STATE) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, "persisted focus state unreadable; starting idle");
                None
            }
        };
        let Some(record) = record else {
            return Vec::new();
        };
        let (true, Some(end_time)) = (record.is_running, record.end_time) else {
            return Vec::new();
        };

        let now = self.clock.now();
        self.focus = FocusPhase::Running {
            is_break: record.is_break,
            end_time,
        };
        if self.focus.is_complete(now) {
            return self.complete_timer(false);
        }

        tracing::info!(is_break = record.is_break, "focus session restored");
        self.broadcast();
        vec![Directive::StartTicking]
    }

    /// Feeds one activity event through the tracker and applies the
    /// resulting effects.
    pub fn handle_activity(&mut self, event: &ActivityEvent) -> Vec<Directive> {
        let now = self.clock.now();
        let (next, effects) = step(mem::take(&mut self.tracker), event, now);
        self.tracker = next;

        let mut directives = Vec::new();
        for effect in effects {
            match effect {
                Effect::Accumulate { domain, seconds } => {
                    if let Err(error) = aggregate::accumulate(self.kv.as_ref(), now, &domain, seconds)
                    {
                        // The elapsed span stays un-recorded; the next
                        // flush retries against the store.
                        tracing::warn!(%domain, seconds, %error, "failed to record session time");
                        continue;
                    }
                    self.evaluate_limit(&domain);
                    if matches!(self.tracker, TrackerState::Active(_)) && directives.is_empty() {
                        directives.push(Directive::ScheduleFlush {
                            delay_secs: FLUSH_DEBOUNCE_SECS,
                        });
                    }
                }
                Effect::CheckLimit { domain } => self.evaluate_limit(&domain),
            }
        }
        directives
    }

    fn evaluate_limit(&mut self, domain: &Domain) {
        let now = self.clock.now();
        if let Err(error) = self.evaluator.evaluate(
            self.kv.as_ref(),
            &mut self.rules,
            self.notifier.as_ref(),
            now,
            domain,
        ) {
            tracing::warn!(%domain, %error, "limit evaluation failed");
        }
    }

    /// Handles one focus-timer command.
    pub fn handle_focus(&mut self, request: &FocusRequest) -> Vec<Directive> {
        let now = self.clock.now();
        match request {
            FocusRequest::StartFocus { duration_secs } => {
                self.focus = FocusPhase::start_focus(now, *duration_secs);
                self.start_timer()
            }
            FocusRequest::StartBreak { duration_secs } => {
                self.focus = FocusPhase::start_break(now, *duration_secs);
                self.start_timer()
            }
            FocusRequest::StopFocus => self.stop_timer(),
            FocusRequest::BlockDistractions { sites } => {
                let set: DistractingSites = sites.iter().cloned().collect();
                if let Err(error) = set_typed(self.kv.as_ref(), KEY_DISTRACTING_SITES, &set) {
                    tracing::warn!(%error, "failed to persist distracting sites");
                }
                if let Err(error) = self.rules.enable_focus_mode(sites) {
                    tracing::warn!(%error, "failed to block distracting sites");
                }
                Vec::new()
            }
            FocusRequest::UnblockDistractions => {
                if let Err(error) = self.rules.disable_focus_mode() {
                    tracing::warn!(%error, "failed to unblock distracting sites");
                }
                Vec::new()
            }
            FocusRequest::QueryState => {
                self.broadcast();
                Vec::new()
            }
        }
    }

    fn start_timer(&mut self) -> Vec<Directive> {
        let FocusPhase::Running { is_break, .. } = self.focus else {
            return Vec::new();
        };

        self.persist_focus_state();
        if is_break {
            // Breaks never block; clear anything focus mode installed.
            if let Err(error) = self.rules.disable_focus_mode() {
                tracing::warn!(%error, "failed to clear rules for break");
            }
        } else {
            let sites = self.distracting_sites();
            if let Err(error) = self.rules.enable_focus_mode(&sites) {
                tracing::warn!(%error, "failed to enable focus blocking");
            }
        }
        self.broadcast();
        vec![Directive::StartTicking]
    }

    /// One 1 Hz tick: broadcast the countdown, handle completion.
    pub fn focus_tick(&mut self) -> Vec<Directive> {
        let now = self.clock.now();
        if self.focus == FocusPhase::Idle {
            // late tick after a stop
            return vec![Directive::StopTicking];
        }
        if self.focus.is_complete(now) {
            return self.complete_timer(true);
        }
        self.persist_focus_state();
        self.broadcast();
        Vec::new()
    }

    fn complete_timer(&mut self, notify: bool) -> Vec<Directive> {
        let FocusPhase::Running { is_break, .. } = self.focus else {
            return vec![Directive::StopTicking];
        };
        self.focus = FocusPhase::Idle;

        if let Err(error) = self.kv.remove(KEY_FOCUS_STATE) {
            tracing::warn!(%error, "failed to clear persisted focus state");
        }
        if !is_break {
            if let Err(error) = self.rules.disable_focus_mode() {
                tracing::warn!(%error, "failed to disable focus blocking");
            }
        }
        if notify {
            if is_break {
                self.notifier.show(
                    "break_complete",
                    "Break Complete",
                    "Ready to start another focus session?",
                );
            } else {
                self.notifier.show(
                    "focus_complete",
                    "Focus Session Complete",
                    "Great work! Time for a break?",
                );
            }
        }
        self.broadcast();
        vec![Directive::StopTicking]
    }

    fn stop_timer(&mut self) -> Vec<Directive> {
        self.focus = FocusPhase::Idle;
        if let Err(error) = self.kv.remove(KEY_FOCUS_STATE) {
            tracing::warn!(%error, "failed to clear persisted focus state");
        }
        if let Err(error) = self.rules.disable_focus_mode() {
            tracing::warn!(%error, "failed to disable focus blocking");
        }
        self.broadcast();
        vec![Directive::StopTicking]
    }

    fn persist_focus_state(&self) {
        let state = self.focus.state(self.clock.now());
        let record = FocusStateRecord {
            time_left: state.time_left,
            is_running: state.is_running,
            is_break: state.is_break,
            end_time: state.end_time,
        };
        if let Err(error) = set_typed(self.kv.as_ref(), KEY_FOCUS_STATE, &record) {
            tracing::warn!(%error, "failed to persist focus state");
        }
    }

    fn distracting_sites(&self) -> Vec<Domain> {
        match get_typed::<DistractingSites>(self.kv.as_ref(), KEY_DISTRACTING_SITES) {
            Ok(Some(sites)) => sites.into_iter().collect(),
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!(%error, "distracting sites unreadable; blocking nothing");
                Vec::new()
            }
        }
    }

    fn broadcast(&self) {
        let state = self.focus.state(self.clock.now());
        if let Err(error) = self.bus.broadcast(&state) {
            // no listener attached is the common case
            tracing::debug!(%error, "focus state broadcast not delivered");
        }
    }

    pub fn tracker(&self) -> &TrackerState {
        &self.tracker
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus.state(self.clock.now())
    }
}
