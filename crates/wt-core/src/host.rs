//! External collaborator interfaces.
//!
//! The core never talks to a browser directly. Persistence, rule
//! enforcement, notifications and the UI message bus are all behind the
//! traits in this module; the process entry point injects concrete
//! adapters. Every call site in the core treats a failure from these
//! traits as a degraded feature, never as fatal.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::focus::FocusState;
use crate::rules::RuleDescriptor;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not service the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A persisted record did not decode into its expected shape.
    #[error("corrupt record under key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The persistent key-value store (e.g. browser-profile storage, or the
/// sqlite adapter in `wt-store`). Values are JSON; call-ordered within a
/// process.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Reads a typed record from the store, `None` if the key is absent.
pub fn get_typed<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match kv.get(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Writes a typed record to the store.
pub fn set_typed<T: Serialize>(
    kv: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    kv.set(key, value)
}

/// Rule-engine failures.
#[derive(Debug, Error)]
#[error("rule engine unavailable: {0}")]
pub struct RuleEngineError(pub String);

/// The host's rule-enforcement engine. The core only computes which
/// rules to submit or withdraw; interception is the host's job.
pub trait RuleEngine {
    /// Lists the currently installed dynamic rules.
    fn list_rules(&self) -> Result<Vec<RuleDescriptor>, RuleEngineError>;

    /// Removes `remove_ids` then installs `add`, as one call.
    fn update_rules(
        &mut self,
        remove_ids: &[u32],
        add: &[RuleDescriptor],
    ) -> Result<(), RuleEngineError>;
}

/// The notification-display surface. Implementations dedupe by `key`.
pub trait Notifier {
    fn show(&self, key: &str, title: &str, body: &str);
}

/// Broadcast failure, e.g. no listener on the bus. Expected and
/// swallowed by callers.
#[derive(Debug, Error)]
#[error("broadcast failed: {0}")]
pub struct BusError(pub String);

/// Outbound half of the message bus: pushes focus-timer state to any
/// listening UI surface.
pub trait FocusBus {
    fn broadcast(&self, state: &FocusState) -> Result<(), BusError>;
}

/// In-process key-value store.
///
/// Backs tests and `wt run --ephemeral`. Clones share the same map, so
/// a test can hold one handle for inspection while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Rc<RefCell<BTreeMap<String, Value>>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.0.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.0.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.0.borrow_mut().remove(key);
        Ok(())
    }
}

/// In-process rule engine.
///
/// Holds submitted rules without enforcing anything; the stand-in used
/// where no real interception engine is attached, and the inspection
/// seam for tests. Clones share the same rule table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuleEngine(Rc<RefCell<BTreeMap<u32, RuleDescriptor>>>);

impl InMemoryRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the installed rules, ordered by ID.
    pub fn snapshot(&self) -> Vec<RuleDescriptor> {
        self.0.borrow().values().cloned().collect()
    }
}

impl RuleEngine for InMemoryRuleEngine {
    fn list_rules(&self) -> Result<Vec<RuleDescriptor>, RuleEngineError> {
        Ok(self.snapshot())
    }

    fn update_rules(
        &mut self,
        remove_ids: &[u32],
        add: &[RuleDescriptor],
    ) -> Result<(), RuleEngineError> {
        let mut rules = self.0.borrow_mut();
        for id in remove_ids {
            rules.remove(id);
        }
        for rule in add {
            rules.insert(rule.id, rule.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        set_typed(&store, "answer", &42_u32).unwrap();
        let read: Option<u32> = get_typed(&store, "answer").unwrap();
        assert_eq!(read, Some(42));

        store.remove("answer").unwrap();
        let read: Option<u32> = get_typed(&store, "answer").unwrap();
        assert_eq!(read, None);
    }

    #[test]
    fn get_typed_missing_key_is_none() {
        let store = MemoryStore::new();
        let read: Option<Vec<String>> = get_typed(&store, "absent").unwrap();
        assert_eq!(read, None);
    }

    #[test]
    fn get_typed_reports_corrupt_records() {
        let store = MemoryStore::new();
        store.set("counts", Value::String("not a number".into())).unwrap();
        let result: Result<Option<u32>, _> = get_typed(&store, "counts");
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn memory_store_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        set_typed(&store, "k", &"v").unwrap();
        let read: Option<String> = get_typed(&other, "k").unwrap();
        assert_eq!(read.as_deref(), Some("v"));
    }
}
