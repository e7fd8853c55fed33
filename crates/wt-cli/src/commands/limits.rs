//! Daily site-limit management.

use anyhow::{Context, Result, bail};
use wt_core::host::{KeyValueStore, get_typed, set_typed};
use wt_core::model::KEY_SITE_LIMITS;
use wt_core::{Domain, SiteLimits};

fn load(kv: &dyn KeyValueStore) -> Result<SiteLimits> {
    Ok(get_typed(kv, KEY_SITE_LIMITS)?.unwrap_or_default())
}

pub fn list(kv: &dyn KeyValueStore) -> Result<()> {
    let limits = load(kv)?;
    if limits.is_empty() {
        println!("No limits configured.");
        return Ok(());
    }
    for (domain, minutes) in &limits {
        println!("{domain:<28} {minutes} minutes/day");
    }
    Ok(())
}

pub fn set(kv: &dyn KeyValueStore, domain: &str, minutes: u32) -> Result<()> {
    if minutes == 0 {
        bail!("limit must be at least one minute");
    }
    let domain = Domain::parse(domain).context("invalid domain")?;

    let mut limits = load(kv)?;
    limits.insert(domain.clone(), minutes);
    set_typed(kv, KEY_SITE_LIMITS, &limits)?;

    println!("Limit set: {domain} at {minutes} minutes/day");
    Ok(())
}

pub fn remove(kv: &dyn KeyValueStore, domain: &str) -> Result<()> {
    let domain = Domain::parse(domain).context("invalid domain")?;

    let mut limits = load(kv)?;
    if limits.remove(&domain).is_none() {
        bail!("no limit configured for {domain}");
    }
    set_typed(kv, KEY_SITE_LIMITS, &limits)?;

    println!("Limit removed: {domain}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wt_core::MemoryStore;

    #[test]
    fn set_normalizes_and_persists() {
        let kv = MemoryStore::new();
        set(&kv, "WWW.Example.com", 30).unwrap();

        let limits = load(&kv).unwrap();
        let domain = Domain::parse("example.com").unwrap();
        assert_eq!(limits.get(&domain), Some(&30));
    }

    #[test]
    fn set_rejects_zero_minutes() {
        let kv = MemoryStore::new();
        assert!(set(&kv, "example.com", 0).is_err());
    }

    #[test]
    fn remove_unknown_domain_fails() {
        let kv = MemoryStore::new();
        assert!(remove(&kv, "example.com").is_err());
    }

    #[test]
    fn set_then_remove_roundtrip() {
        let kv = MemoryStore::new();
        set(&kv, "example.com", 30).unwrap();
        remove(&kv, "example.com").unwrap();
        assert!(load(&kv).unwrap().is_empty());
    }
}
