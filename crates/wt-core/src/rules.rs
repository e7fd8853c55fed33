//! Blocking-rule synthesis.
//!
//! Derives the exact set of rule descriptors to submit to the host's
//! rule engine, for per-domain limit blocks and for focus-mode blocks.
//! Rule IDs are a pure function of `(domain, role)`: a stable FNV-1a
//! hash of the domain folded into a role-specific range, so reapplying
//! the same logical rule always targets the same slot and the two rule
//! roles can never collide.

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::host::{RuleEngine, RuleEngineError};

/// Width of each role's ID range.
const ROLE_SPAN: u32 = 0x1000_0000;

/// The purpose a synthesized rule serves. Each role owns a disjoint ID
/// range; rule engines require IDs ≥ 1, which the limit base satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleRole {
    /// Per-domain daily limit block (top-level navigation redirect).
    Limit,
    /// Focus-mode top-level navigation redirect.
    FocusRedirect,
    /// Focus-mode companion block for embedded subresources.
    FocusBlock,
}

impl RuleRole {
    const fn base(self) -> u32 {
        match self {
            Self::Limit => 1,
            Self::FocusRedirect => 0x4000_0000,
            Self::FocusBlock => 0x5000_0000,
        }
    }
}

/// Lowest ID belonging to a focus-mode role. Everything below is a
/// limit rule.
const FOCUS_ID_FLOOR: u32 = RuleRole::FocusRedirect.base();

/// 32-bit FNV-1a. Implemented here rather than pulled from a crate so
/// rule IDs stay identical across builds and releases.
fn fnv1a(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Deterministic rule ID for `(domain, role)`.
pub fn rule_id_for(domain: &Domain, role: RuleRole) -> u32 {
    role.base() + fnv1a(domain.as_str()) % ROLE_SPAN
}

/// Request resource classes a rule condition matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Script,
    Image,
    Stylesheet,
    XmlHttpRequest,
    Websocket,
    Media,
}

/// Every subordinate resource class: embedded content from a blocked
/// domain is suppressed even when the user never navigated there.
const SUBRESOURCE_TYPES: &[ResourceType] = &[
    ResourceType::SubFrame,
    ResourceType::Script,
    ResourceType::Image,
    ResourceType::Stylesheet,
    ResourceType::XmlHttpRequest,
    ResourceType::Websocket,
    ResourceType::Media,
];

/// What the rule engine should do with a matched request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    Redirect { url: String },
    Block,
}

/// One policy-engine rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub id: u32,
    pub priority: u32,
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
    pub action: RuleAction,
}

/// Derives and applies blocking rules through the injected rule engine.
pub struct RuleSynthesizer {
    engine: Box<dyn RuleEngine>,
    block_page: String,
}

impl RuleSynthesizer {
    /// `block_page` is the base URL users are redirected to; the reason
    /// is appended as a query string.
    pub fn new(engine: Box<dyn RuleEngine>, block_page: impl Into<String>) -> Self {
        Self {
            engine,
            block_page: block_page.into(),
        }
    }

    fn url_filter(domain: &Domain) -> String {
        format!("*://*.{domain}/*")
    }

    fn limit_redirect(&self, domain: &Domain) -> String {
        format!(
            "{}?domain={}",
            self.block_page,
            urlencoding::encode(domain.as_str())
        )
    }

    fn focus_redirect(&self) -> String {
        format!("{}?reason=focus", self.block_page)
    }

    /// Idempotently installs the daily-limit block rule for a domain:
    /// top-level navigations are redirected to the block page. Replaces
    /// whatever currently occupies the domain's limit slot.
    pub fn apply_limit_rule(&mut self, domain: &Domain) -> Result<(), RuleEngineError> {
        let id = rule_id_for(domain, RuleRole::Limit);
        let rule = RuleDescriptor {
            id,
            priority: 1,
            url_filter: Self::url_filter(domain),
            resource_types: vec![ResourceType::MainFrame],
            action: RuleAction::Redirect {
                url: self.limit_redirect(domain),
            },
        };
        self.engine.update_rules(&[id], &[rule])?;
        tracing::debug!(%domain, rule_id = id, "limit rule applied");
        Ok(())
    }

    /// Replaces any active focus rules with the set for `domains`: a
    /// navigation redirect plus a companion subresource block per
    /// domain.
    pub fn enable_focus_mode(&mut self, domains: &[Domain]) -> Result<(), RuleEngineError> {
        self.clear_focus_rules()?;

        let mut add = Vec::with_capacity(domains.len() * 2);
        for domain in domains {
            add.push(RuleDescriptor {
                id: rule_id_for(domain, RuleRole::FocusRedirect),
                priority: 1,
                url_filter: Self::url_filter(domain),
                resource_types: vec![ResourceType::MainFrame],
                action: RuleAction::Redirect {
                    url: self.focus_redirect(),
                },
            });
            add.push(RuleDescriptor {
                id: rule_id_for(domain, RuleRole::FocusBlock),
                priority: 1,
                url_filter: Self::url_filter(domain),
                resource_types: SUBRESOURCE_TYPES.to_vec(),
                action: RuleAction::Block,
            });
        }

        let remove: Vec<u32> = add.iter().map(|rule| rule.id).collect();
        self.engine.update_rules(&remove, &add)?;
        tracing::info!(count = domains.len(), "focus mode rules installed");
        Ok(())
    }

    /// Removes every installed rule. Over-clearing limit rules is fine:
    /// they are re-derived lazily on the next limit evaluation.
    pub fn disable_focus_mode(&mut self) -> Result<(), RuleEngineError> {
        let installed = self.engine.list_rules()?;
        if installed.is_empty() {
            return Ok(());
        }
        let remove: Vec<u32> = installed.iter().map(|rule| rule.id).collect();
        self.engine.update_rules(&remove, &[])?;
        tracing::info!(count = remove.len(), "all rules cleared");
        Ok(())
    }

    fn clear_focus_rules(&mut self) -> Result<(), RuleEngineError> {
        let focus_ids: Vec<u32> = self
            .engine
            .list_rules()?
            .iter()
            .map(|rule| rule.id)
            .filter(|&id| id >= FOCUS_ID_FLOOR)
            .collect();
        if focus_ids.is_empty() {
            return Ok(());
        }
        self.engine.update_rules(&focus_ids, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryRuleEngine;

    fn domain(name: &str) -> Domain {
        Domain::parse(name).unwrap()
    }

    fn synthesizer() -> (RuleSynthesizer, InMemoryRuleEngine) {
        let engine = InMemoryRuleEngine::new();
        let synth = RuleSynthesizer::new(Box::new(engine.clone()), "webtime://block");
        (synth, engine)
    }

    #[test]
    fn rule_ids_are_stable() {
        let d = domain("example.com");
        assert_eq!(
            rule_id_for(&d, RuleRole::Limit),
            rule_id_for(&d, RuleRole::Limit)
        );
    }

    #[test]
    fn rule_roles_never_collide() {
        for name in ["example.com", "a.com", "b.com", "news.ycombinator.com", "x"] {
            let d = domain(name);
            let limit = rule_id_for(&d, RuleRole::Limit);
            let redirect = rule_id_for(&d, RuleRole::FocusRedirect);
            let block = rule_id_for(&d, RuleRole::FocusBlock);

            assert!(limit >= 1 && limit < FOCUS_ID_FLOOR);
            assert!((0x4000_0000..0x5000_0000).contains(&redirect));
            assert!(block >= 0x5000_0000);
        }
    }

    #[test]
    fn apply_limit_rule_is_idempotent() {
        let (mut synth, engine) = synthesizer();
        let d = domain("example.com");

        synth.apply_limit_rule(&d).unwrap();
        synth.apply_limit_rule(&d).unwrap();

        let rules = engine.snapshot();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, rule_id_for(&d, RuleRole::Limit));
        assert_eq!(rules[0].resource_types, vec![ResourceType::MainFrame]);
    }

    #[test]
    fn limit_redirect_encodes_domain() {
        let (mut synth, engine) = synthesizer();
        synth.apply_limit_rule(&domain("example.com")).unwrap();

        let rules = engine.snapshot();
        let RuleAction::Redirect { url } = &rules[0].action else {
            panic!("expected redirect action");
        };
        assert_eq!(url, "webtime://block?domain=example.com");
    }

    #[test]
    fn enable_focus_mode_installs_redirect_and_block_per_domain() {
        let (mut synth, engine) = synthesizer();
        synth
            .enable_focus_mode(&[domain("a.com"), domain("b.com")])
            .unwrap();

        let rules = engine.snapshot();
        assert_eq!(rules.len(), 4);

        let redirects = rules
            .iter()
            .filter(|r| matches!(r.action, RuleAction::Redirect { .. }))
            .count();
        let blocks = rules
            .iter()
            .filter(|r| r.action == RuleAction::Block)
            .count();
        assert_eq!(redirects, 2);
        assert_eq!(blocks, 2);

        let block_rule = rules.iter().find(|r| r.action == RuleAction::Block).unwrap();
        assert!(block_rule.resource_types.contains(&ResourceType::Script));
        assert!(block_rule.resource_types.contains(&ResourceType::Websocket));
        assert!(!block_rule.resource_types.contains(&ResourceType::MainFrame));
    }

    #[test]
    fn enable_focus_mode_replaces_previous_set() {
        let (mut synth, engine) = synthesizer();
        synth
            .enable_focus_mode(&[domain("a.com"), domain("b.com")])
            .unwrap();
        synth.enable_focus_mode(&[domain("a.com")]).unwrap();

        let rules = engine.snapshot();
        assert_eq!(rules.len(), 2);
        let a = domain("a.com");
        let ids: Vec<u32> = rules.iter().map(|r| r.id).collect();
        assert!(ids.contains(&rule_id_for(&a, RuleRole::FocusRedirect)));
        assert!(ids.contains(&rule_id_for(&a, RuleRole::FocusBlock)));
    }

    #[test]
    fn enable_focus_mode_leaves_limit_rules_alone() {
        let (mut synth, engine) = synthesizer();
        let limited = domain("example.com");
        synth.apply_limit_rule(&limited).unwrap();
        synth.enable_focus_mode(&[domain("a.com")]).unwrap();
        synth.enable_focus_mode(&[domain("b.com")]).unwrap();

        let ids: Vec<u32> = engine.snapshot().iter().map(|r| r.id).collect();
        assert!(ids.contains(&rule_id_for(&limited, RuleRole::Limit)));
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn disable_focus_mode_clears_everything() {
        let (mut synth, engine) = synthesizer();
        synth.apply_limit_rule(&domain("example.com")).unwrap();
        synth.enable_focus_mode(&[domain("a.com")]).unwrap();

        synth.disable_focus_mode().unwrap();
        assert!(engine.snapshot().is_empty());

        // idempotent on an empty engine
        synth.disable_focus_mode().unwrap();
    }

    #[test]
    fn engine_failure_surfaces_but_does_not_panic() {
        struct FailingEngine;
        impl RuleEngine for FailingEngine {
            fn list_rules(&self) -> Result<Vec<RuleDescriptor>, RuleEngineError> {
                Err(RuleEngineError("engine offline".into()))
            }
            fn update_rules(
                &mut self,
                _remove_ids: &[u32],
                _add: &[RuleDescriptor],
            ) -> Result<(), RuleEngineError> {
                Err(RuleEngineError("engine offline".into()))
            }
        }

        let mut synth = RuleSynthesizer::new(Box::new(FailingEngine), "webtime://block");
        assert!(synth.apply_limit_rule(&domain("example.com")).is_err());
        assert!(synth.disable_focus_mode().is_err());
    }
}
