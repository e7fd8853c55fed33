//! Core logic for the web time tracker.
//!
//! This crate contains the browser-independent pieces:
//! - Session tracking: turning tab/window activity into timed sessions
//! - Aggregation: daily per-domain totals with hourly breakdowns
//! - Limits: daily budget warnings and blocking
//! - Rules: deterministic blocking-rule synthesis
//! - Focus: the focus/break countdown timer
//!
//! Everything host-specific (persistence, rule enforcement,
//! notifications, the UI bus) sits behind the traits in [`host`].

pub mod aggregate;
pub mod clock;
pub mod domain;
pub mod engine;
pub mod focus;
pub mod host;
pub mod limits;
pub mod model;
pub mod rules;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{Domain, DomainError};
pub use engine::{Directive, Engine, FocusRequest};
pub use focus::{FocusPhase, FocusState};
pub use host::{
    BusError, FocusBus, InMemoryRuleEngine, KeyValueStore, MemoryStore, Notifier, RuleEngine,
    RuleEngineError, StoreError,
};
pub use limits::{LimitEvaluator, LimitState};
pub use model::{DailyBucket, DomainStat, FocusStateRecord, SiteLimits, TimeData};
pub use rules::{RuleAction, RuleDescriptor, RuleSynthesizer};
pub use tracker::{ActivityEvent, Effect, TabInfo, TrackerState};
