//! Language, location and host descriptors used to scope searches.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A search language, e.g. `Language::new("German", "de")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLocale")]
pub struct Language {
    pub name: String,
    pub code: String,
}

impl Language {
    pub fn new(name: impl Into<String>, code: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            code: code.as_ref().trim().to_lowercase(),
        }
    }
}

/// A search location, e.g. `Location::new("Switzerland", "ch")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLocale")]
pub struct Location {
    pub name: String,
    pub code: String,
}

impl Location {
    pub fn new(name: impl Into<String>, code: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            code: code.as_ref().trim().to_lowercase(),
        }
    }
}

#[derive(Deserialize)]
struct RawLocale {
    name: String,
    code: String,
}

impl From<RawLocale> for Language {
    fn from(raw: RawLocale) -> Self {
        Self::new(raw.name, raw.code)
    }
}

impl From<RawLocale> for Location {
    fn from(raw: RawLocale) -> Self {
        Self::new(raw.name, raw.code)
    }
}

/// A named marketplace or site, owning one or more domains.
///
/// Domains are normalized: trimmed, lower-cased, without a leading `www.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawHost")]
pub struct Host {
    pub name: String,
    pub domains: BTreeSet<String>,
}

impl Host {
    /// Create a host from a comma-separated domain list (`"galaxus.ch, digitec.ch"`).
    pub fn new(name: impl Into<String>, domains: &str) -> Self {
        Self::from_domains(name, domains.split(','))
    }

    /// Create a host from individual domains.
    pub fn from_domains<I, S>(name: impl Into<String>, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .filter_map(|d| normalize_domain(d.as_ref()))
            .collect();
        Self {
            name: name.into(),
            domains,
        }
    }

    /// Whether `domain` is one of this host's domains or a sub-domain of one.
    pub fn matches(&self, domain: &str) -> bool {
        let Some(domain) = normalize_domain(domain) else {
            return false;
        };
        self.domains.iter().any(|d| {
            domain == *d
                || domain
                    .strip_suffix(d.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Lower-case, trim and strip `www.`; `None` for empty input.
pub fn normalize_domain(domain: &str) -> Option<String> {
    let domain = domain.trim().to_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DomainList {
    Joined(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct RawHost {
    name: String,
    domains: DomainList,
}

impl From<RawHost> for Host {
    fn from(raw: RawHost) -> Self {
        match raw.domains {
            DomainList::Joined(joined) => Host::new(raw.name, &joined),
            DomainList::List(list) => Host::from_domains(raw.name, list),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_splits_and_normalizes() {
        let host = Host::new("Galaxus", " galaxus.ch, Digitec.CH ,www.galaxus.de,");
        let domains: Vec<_> = host.domains.iter().cloned().collect();
        assert_eq!(domains, vec!["digitec.ch", "galaxus.ch", "galaxus.de"]);
    }

    #[test]
    fn test_host_matches_subdomains() {
        let host = Host::new("Ricardo", "ricardo.ch");
        assert!(host.matches("ricardo.ch"));
        assert!(host.matches("www.ricardo.ch"));
        assert!(host.matches("auto.ricardo.ch"));
        assert!(!host.matches("notricardo.ch"));
        assert!(!host.matches("ricardo.com"));
    }

    #[test]
    fn test_locale_codes_lowercased() {
        assert_eq!(Language::new("German", "DE").code, "de");
        let location: Location =
            serde_json::from_str(r#"{"name": "Switzerland", "code": "CH"}"#).unwrap();
        assert_eq!(location.code, "ch");
    }

    #[test]
    fn test_host_deserializes_from_string_or_list() {
        let joined: Host =
            serde_json::from_str(r#"{"name": "Galaxus", "domains": "galaxus.ch, digitec.ch"}"#)
                .unwrap();
        let listed: Host =
            serde_json::from_str(r#"{"name": "Galaxus", "domains": ["digitec.ch", "galaxus.ch"]}"#)
                .unwrap();
        assert_eq!(joined, listed);
    }
}
