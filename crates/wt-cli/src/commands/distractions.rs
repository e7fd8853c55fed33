//! Distracting-sites list management.
//!
//! The list only takes effect when a focus session starts; editing it
//! here never touches blocking rules directly.

use anyhow::{Context, Result, bail};
use wt_core::Domain;
use wt_core::host::{KeyValueStore, get_typed, set_typed};
use wt_core::model::{DistractingSites, KEY_DISTRACTING_SITES};

fn load(kv: &dyn KeyValueStore) -> Result<DistractingSites> {
    Ok(get_typed(kv, KEY_DISTRACTING_SITES)?.unwrap_or_default())
}

pub fn list(kv: &dyn KeyValueStore) -> Result<()> {
    let sites = load(kv)?;
    if sites.is_empty() {
        println!("No distracting sites configured.");
        return Ok(());
    }
    for domain in &sites {
        println!("{domain}");
    }
    Ok(())
}

pub fn add(kv: &dyn KeyValueStore, domain: &str) -> Result<()> {
    let domain = Domain::parse(domain).context("invalid domain")?;

    let mut sites = load(kv)?;
    if !sites.insert(domain.clone()) {
        println!("{domain} is already listed.");
        return Ok(());
    }
    set_typed(kv, KEY_DISTRACTING_SITES, &sites)?;

    println!("Added {domain}");
    Ok(())
}

pub fn remove(kv: &dyn KeyValueStore, domain: &str) -> Result<()> {
    let domain = Domain::parse(domain).context("invalid domain")?;

    let mut sites = load(kv)?;
    if !sites.remove(&domain) {
        bail!("{domain} is not listed");
    }
    set_typed(kv, KEY_DISTRACTING_SITES, &sites)?;

    println!("Removed {domain}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wt_core::MemoryStore;

    #[test]
    fn add_normalizes_and_dedupes() {
        let kv = MemoryStore::new();
        add(&kv, "www.social.example").unwrap();
        add(&kv, "social.example").unwrap();

        let sites = load(&kv).unwrap();
        assert_eq!(sites.len(), 1);
        assert!(sites.contains(&Domain::parse("social.example").unwrap()));
    }

    #[test]
    fn remove_unknown_domain_fails() {
        let kv = MemoryStore::new();
        assert!(remove(&kv, "social.example").is_err());
    }

    #[test]
    fn add_then_remove_roundtrip() {
        let kv = MemoryStore::new();
        add(&kv, "social.example").unwrap();
        remove(&kv, "social.example").unwrap();
        assert!(load(&kv).unwrap().is_empty());
    }
}
