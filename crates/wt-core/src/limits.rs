//! Daily budget evaluation.
//!
//! Compares a domain's recorded time for today against its configured
//! budget and drives the warning/block transitions. Per (domain, date)
//! this is a one-way machine: `Normal → Warned → Blocked`. Nothing here
//! ever unblocks; the next calendar day resets naturally because totals
//! are keyed by date.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::aggregate;
use crate::domain::Domain;
use crate::host::{KeyValueStore, Notifier, StoreError, get_typed};
use crate::model::{KEY_SITE_LIMITS, SiteLimits};
use crate::rules::RuleSynthesizer;

/// Fraction of the budget at which the warning fires.
const WARN_NUMERATOR: i64 = 8;
const WARN_DENOMINATOR: i64 = 10;

/// Where a domain stands against its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LimitState {
    Normal,
    Warned,
    Blocked,
}

/// Evaluates budgets and raises transitions.
///
/// Both suppression sets are in-memory only and keyed by date: one
/// warning per domain per day (a restart may re-warn), and a per-date
/// blocked marker so the machine stays monotonic even if a recomputed
/// percentage were somehow lower. A fresh calendar day starts both
/// machines over.
#[derive(Debug, Default)]
pub struct LimitEvaluator {
    warned: HashMap<Domain, NaiveDate>,
    blocked: HashMap<Domain, NaiveDate>,
}

impl LimitEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `domain` against its configured budget for `now`'s date.
    ///
    /// At or over budget the block rule is (re)applied idempotently and
    /// a "limit reached" notification is emitted; the notification
    /// surface dedupes by key. A rule-engine failure is logged and the
    /// evaluator state still advances, so the next evaluation retries.
    pub fn evaluate(
        &mut self,
        kv: &dyn KeyValueStore,
        rules: &mut RuleSynthesizer,
        notifier: &dyn Notifier,
        now: NaiveDateTime,
        domain: &Domain,
    ) -> Result<LimitState, StoreError> {
        let limits: SiteLimits = get_typed(kv, KEY_SITE_LIMITS)?.unwrap_or_default();
        let Some(&budget_minutes) = limits.get(domain) else {
            return Ok(LimitState::Normal);
        };

        let today = now.date();
        if self.blocked.get(domain) != Some(&today) {
            // stale marker from a previous date
            self.blocked.remove(domain);
        }

        let total_secs = aggregate::read(kv)?.domain_seconds(today, domain);
        let budget_secs = i64::from(budget_minutes) * 60;

        let over_budget = total_secs >= budget_secs;
        let near_budget = total_secs * WARN_DENOMINATOR >= budget_secs * WARN_NUMERATOR;

        if over_budget || self.blocked.contains_key(domain) {
            self.blocked.insert(domain.clone(), today);
            if let Err(error) = rules.apply_limit_rule(domain) {
                tracing::warn!(%domain, %error, "block rule not applied; will retry on next evaluation");
            }
            notifier.show(
                &format!("limit_{domain}"),
                "Time Limit Reached",
                &format!("You've reached your time limit for {domain}"),
            );
            return Ok(LimitState::Blocked);
        }

        if near_budget {
            if self.warned.insert(domain.clone(), today) != Some(today) {
                let minutes_spent = total_secs / 60;
                notifier.show(
                    &format!("warning_{domain}"),
                    "Time Limit Warning",
                    &format!(
                        "You've used {minutes_spent}/{budget_minutes} minutes on {domain} today"
                    ),
                );
            }
            return Ok(LimitState::Warned);
        }
        Ok(LimitState::Normal)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::aggregate::accumulate;
    use crate::host::{InMemoryRuleEngine, MemoryStore, set_typed};
    use crate::rules::{RuleRole, rule_id_for};
    use chrono::NaiveDate;

    /// Records every show() call; key, title, body.
    #[derive(Debug, Clone, Default)]
    struct RecordingNotifier(Rc<RefCell<Vec<(String, String, String)>>>);

    impl Notifier for RecordingNotifier {
        fn show(&self, key: &str, title: &str, body: &str) {
            self.0
                .borrow_mut()
                .push((key.to_string(), title.to_string(), body.to_string()));
        }
    }

    struct Fixture {
        kv: MemoryStore,
        rules: RuleSynthesizer,
        engine: InMemoryRuleEngine,
        notifier: RecordingNotifier,
        evaluator: LimitEvaluator,
    }

    fn fixture(budget_minutes: u32) -> Fixture {
        let kv = MemoryStore::new();
        let mut limits = SiteLimits::new();
        limits.insert(domain(), budget_minutes);
        set_typed(&kv, KEY_SITE_LIMITS, &limits).unwrap();

        let engine = InMemoryRuleEngine::new();
        Fixture {
            kv,
            rules: RuleSynthesizer::new(Box::new(engine.clone()), "webtime://block"),
            engine,
            notifier: RecordingNotifier::default(),
            evaluator: LimitEvaluator::new(),
        }
    }

    fn domain() -> Domain {
        Domain::parse("example.com").unwrap()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn evaluate(fx: &mut Fixture) -> LimitState {
        fx.evaluator
            .evaluate(&fx.kv, &mut fx.rules, &fx.notifier, noon(), &domain())
            .unwrap()
    }

    #[test]
    fn unlimited_domain_is_normal() {
        let mut fx = fixture(30);
        let other = Domain::parse("other.com").unwrap();
        accumulate(&fx.kv, noon(), &other, 100_000).unwrap();

        let state = fx
            .evaluator
            .evaluate(&fx.kv, &mut fx.rules, &fx.notifier, noon(), &other)
            .unwrap();
        assert_eq!(state, LimitState::Normal);
        assert!(fx.notifier.0.borrow().is_empty());
    }

    #[test]
    fn under_eighty_percent_is_normal() {
        let mut fx = fixture(30);
        accumulate(&fx.kv, noon(), &domain(), 1_000).unwrap(); // ~16m of 30m

        assert_eq!(evaluate(&mut fx), LimitState::Normal);
        assert!(fx.notifier.0.borrow().is_empty());
        assert!(fx.engine.snapshot().is_empty());
    }

    #[test]
    fn warning_fires_once_at_eighty_percent() {
        let mut fx = fixture(30);
        accumulate(&fx.kv, noon(), &domain(), 1_500).unwrap(); // 25m of 30m

        assert_eq!(evaluate(&mut fx), LimitState::Warned);
        assert_eq!(evaluate(&mut fx), LimitState::Warned);

        let shown = fx.notifier.0.borrow();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, "warning_example.com");
        assert_eq!(shown[0].2, "You've used 25/30 minutes on example.com today");
        assert!(fx.engine.snapshot().is_empty());
    }

    #[test]
    fn block_applies_rule_at_budget() {
        let mut fx = fixture(30);
        accumulate(&fx.kv, noon(), &domain(), 1_800).unwrap(); // exactly 30m

        assert_eq!(evaluate(&mut fx), LimitState::Blocked);

        let rules = fx.engine.snapshot();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, rule_id_for(&domain(), RuleRole::Limit));

        let shown = fx.notifier.0.borrow();
        assert_eq!(shown.last().unwrap().0, "limit_example.com");
    }

    #[test]
    fn repeated_block_evaluations_do_not_duplicate_rules() {
        let mut fx = fixture(30);
        accumulate(&fx.kv, noon(), &domain(), 2_000).unwrap();

        assert_eq!(evaluate(&mut fx), LimitState::Blocked);
        assert_eq!(evaluate(&mut fx), LimitState::Blocked);
        assert_eq!(evaluate(&mut fx), LimitState::Blocked);

        assert_eq!(fx.engine.snapshot().len(), 1);
        // repeated notifications share the dedupe key
        let shown = fx.notifier.0.borrow();
        assert!(shown.iter().all(|(key, _, _)| key == "limit_example.com"));
    }

    #[test]
    fn warning_then_block_scenario() {
        let mut fx = fixture(30);

        accumulate(&fx.kv, noon(), &domain(), 1_500).unwrap(); // 25m
        assert_eq!(evaluate(&mut fx), LimitState::Warned);

        accumulate(&fx.kv, noon(), &domain(), 300).unwrap(); // 30m total
        assert_eq!(evaluate(&mut fx), LimitState::Blocked);

        let shown = fx.notifier.0.borrow();
        assert_eq!(shown[0].0, "warning_example.com");
        assert_eq!(shown[1].0, "limit_example.com");
        assert_eq!(shown.len(), 2);
    }

    #[test]
    fn blocked_is_monotonic_within_a_date() {
        let mut fx = fixture(30);
        accumulate(&fx.kv, noon(), &domain(), 1_800).unwrap();
        assert_eq!(evaluate(&mut fx), LimitState::Blocked);

        // Hand the evaluator a lower total for the same date; it must
        // not regress. (Cannot happen through accumulate, which is
        // append-only; this pins the invariant structurally.)
        fx.kv.remove(crate::model::KEY_TIME_DATA).unwrap();
        assert_eq!(evaluate(&mut fx), LimitState::Blocked);
    }

    #[test]
    fn next_day_resets_blocked_state() {
        let mut fx = fixture(30);
        accumulate(&fx.kv, noon(), &domain(), 1_800).unwrap();
        assert_eq!(evaluate(&mut fx), LimitState::Blocked);

        let tomorrow = noon() + chrono::Duration::days(1);
        let state = fx
            .evaluator
            .evaluate(&fx.kv, &mut fx.rules, &fx.notifier, tomorrow, &domain())
            .unwrap();
        assert_ne!(state, LimitState::Blocked);
    }

    #[test]
    fn next_day_resets_warned_state() {
        let mut fx = fixture(30);
        accumulate(&fx.kv, noon(), &domain(), 1_500).unwrap();
        assert_eq!(evaluate(&mut fx), LimitState::Warned);

        // nothing recorded yet on the new day
        let tomorrow = noon() + chrono::Duration::days(1);
        let state = fx
            .evaluator
            .evaluate(&fx.kv, &mut fx.rules, &fx.notifier, tomorrow, &domain())
            .unwrap();
        assert_eq!(state, LimitState::Normal);

        // crossing 80% again on the new day warns again
        accumulate(&fx.kv, tomorrow, &domain(), 1_500).unwrap();
        let state = fx
            .evaluator
            .evaluate(&fx.kv, &mut fx.rules, &fx.notifier, tomorrow, &domain())
            .unwrap();
        assert_eq!(state, LimitState::Warned);
        assert_eq!(fx.notifier.0.borrow().len(), 2);
    }

    #[test]
    fn rule_engine_failure_still_advances_state() {
        use crate::rules::RuleDescriptor;

        struct FailingEngine;
        impl crate::host::RuleEngine for FailingEngine {
            fn list_rules(&self) -> Result<Vec<RuleDescriptor>, crate::host::RuleEngineError> {
                Err(crate::host::RuleEngineError("offline".into()))
            }
            fn update_rules(
                &mut self,
                _remove_ids: &[u32],
                _add: &[RuleDescriptor],
            ) -> Result<(), crate::host::RuleEngineError> {
                Err(crate::host::RuleEngineError("offline".into()))
            }
        }

        let mut fx = fixture(30);
        fx.rules = RuleSynthesizer::new(Box::new(FailingEngine), "webtime://block");
        accumulate(&fx.kv, noon(), &domain(), 1_800).unwrap();

        // Evaluation reports Blocked despite the engine being down.
        assert_eq!(evaluate(&mut fx), LimitState::Blocked);
    }
}
