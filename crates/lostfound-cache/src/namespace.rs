//! Environment-scoped cache keys.
//!
//! ## Key Format
//!
//! `{app}:{environment}:{raw_key}`, e.g. `lostfound:prod:item:42`
//!
//! Both prefix segments are restricted to `[A-Za-z0-9_-]`. With the separator
//! excluded from the segments the prefix is always recoverable, so two
//! deployments can never produce the same full key.

use crate::error::CacheError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespacer {
    prefix: String,
}

impl KeyNamespacer {
    pub fn new(app: &str, environment: &str) -> Result<Self, CacheError> {
        validate_segment(app)?;
        validate_segment(environment)?;
        Ok(Self {
            prefix: format!("{app}:{environment}:"),
        })
    }

    /// Prefix a raw key (or key pattern) with the deployment namespace.
    #[inline]
    pub fn namespace(&self, raw_key: &str) -> String {
        let mut key = String::with_capacity(self.prefix.len() + raw_key.len());
        key.push_str(&self.prefix);
        key.push_str(raw_key);
        key
    }

    /// Strip the namespace from a full key. Returns `None` for foreign keys.
    pub fn strip<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        full_key.strip_prefix(self.prefix.as_str())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

fn validate_segment(segment: &str) -> Result<(), CacheError> {
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidNamespace(segment.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_with_app_and_environment() {
        let ns = KeyNamespacer::new("lostfound", "prod").unwrap();
        assert_eq!(ns.namespace("item:42"), "lostfound:prod:item:42");
        assert_eq!(ns.namespace("items:list:*"), "lostfound:prod:items:list:*");
    }

    #[test]
    fn strip_round_trips_only_own_keys() {
        let ns = KeyNamespacer::new("lostfound", "dev").unwrap();
        let full = ns.namespace("claim:7");
        assert_eq!(ns.strip(&full), Some("claim:7"));
        assert_eq!(ns.strip("lostfound:prod:claim:7"), None);
    }

    #[test]
    fn rejects_separator_and_glob_characters() {
        assert!(KeyNamespacer::new("lostfound", "a:b").is_err());
        assert!(KeyNamespacer::new("lost*found", "dev").is_err());
        assert!(KeyNamespacer::new("", "dev").is_err());
        assert!(KeyNamespacer::new("lostfound", "").is_err());
        assert!(KeyNamespacer::new("lost-found_2", "staging-eu").is_ok());
    }
}
