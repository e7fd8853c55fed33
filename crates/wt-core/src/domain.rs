//! URL to normalized domain extraction.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Schemes the host browser uses for its own pages. URLs with these
/// schemes carry no trackable domain and are skipped, not rejected.
const INTERNAL_SCHEMES: &[&str] = &[
    "about",
    "chrome",
    "chrome-extension",
    "devtools",
    "edge",
    "moz-extension",
    "view-source",
];

/// Domain extraction and validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The input could not be parsed as a URL with a host.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// A domain name was empty after normalization.
    #[error("domain cannot be empty")]
    Empty,
}

/// A normalized web domain: lowercase hostname with a single leading
/// `www.` stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Normalizes and validates a bare domain name (e.g. from config or
    /// CLI input, as opposed to a full URL).
    pub fn parse(name: impl AsRef<str>) -> Result<Self, DomainError> {
        let name = name.as_ref().trim().to_ascii_lowercase();
        let name = name.strip_prefix("www.").unwrap_or(&name);
        if name.is_empty() {
            return Err(DomainError::Empty);
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the domain as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Domain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extracts the trackable domain from a URL.
///
/// Returns `Ok(None)` for the browser's internal schemes (no trackable
/// domain) and `Err(DomainError::InvalidUrl)` for input that does not
/// parse as a URL with a host.
pub fn extract(raw: &str) -> Result<Option<Domain>, DomainError> {
    let parsed = Url::parse(raw).map_err(|_| DomainError::InvalidUrl {
        url: raw.to_string(),
    })?;

    if INTERNAL_SCHEMES.contains(&parsed.scheme()) {
        return Ok(None);
    }

    let host = parsed.host_str().ok_or_else(|| DomainError::InvalidUrl {
        url: raw.to_string(),
    })?;

    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        return Err(DomainError::InvalidUrl {
            url: raw.to_string(),
        });
    }
    Ok(Some(Domain(host.to_string())))
}
