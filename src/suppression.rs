//! Suppression registry boundary: addresses that must never receive mail.
//! Normalization policy lives here and only here — entries and lookups are
//! both lowercased, so call sites never need to normalize.

use std::{
    collections::HashSet,
    fs,
    path::Path,
};

use tracing::debug;

use crate::error::EmailError;

/// Queried once per candidate recipient before any rendering work begins.
/// Implementations must apply the same normalization on both sides of the
/// lookup; [`normalize_address`] is the canonical form.
pub trait SuppressionList: Send + Sync {
    fn contains(&self, address: &str) -> bool;
}

/// Canonical address form used by every registry implementation.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// In-memory suppression registry.
#[derive(Debug, Default, Clone)]
pub struct InMemorySuppressionList {
    entries: HashSet<String>,
}

impl InMemorySuppressionList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| normalize_address(entry.as_ref()))
                .collect(),
        }
    }

    /// Load a newline-delimited suppression file; blank lines and `#`
    /// comments are skipped.
    pub fn from_path(path: &Path) -> Result<Self, EmailError> {
        let contents = fs::read_to_string(path)?;
        let entries = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SuppressionList for InMemorySuppressionList {
    fn contains(&self, address: &str) -> bool {
        self.entries.contains(&normalize_address(address))
    }
}

/// Drop suppressed addresses from the candidate list. Order is preserved and
/// duplicates are not collapsed; batch-level deduplication belongs to the
/// caller. An empty result means the whole send must be skipped silently.
pub fn filter_recipients(candidates: &[String], registry: &dyn SuppressionList) -> Vec<String> {
    let mut deliverable = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if registry.contains(candidate) {
            debug!(
                target = "missive::suppression",
                address = %candidate,
                "recipient suppressed"
            );
            continue;
        }
        deliverable.push(candidate.clone());
    }
    deliverable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_addresses_are_filtered_in_order() {
        let registry = InMemorySuppressionList::new(["blocked@example.com"]);
        let candidates = vec![
            "blocked@example.com".to_string(),
            "ok@example.com".to_string(),
        ];
        assert_eq!(
            filter_recipients(&candidates, &registry),
            vec!["ok@example.com".to_string()]
        );
    }

    #[test]
    fn fully_suppressed_list_filters_to_empty() {
        let registry = InMemorySuppressionList::new(["blocked@example.com"]);
        let candidates = vec!["blocked@example.com".to_string()];
        assert!(filter_recipients(&candidates, &registry).is_empty());
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let registry = InMemorySuppressionList::default();
        let candidates = vec!["a@example.com".to_string(), "a@example.com".to_string()];
        assert_eq!(filter_recipients(&candidates, &registry).len(), 2);
    }

    #[test]
    fn lookup_normalizes_case_on_both_sides() {
        let registry = InMemorySuppressionList::new(["Blocked@Example.COM"]);
        assert!(registry.contains("blocked@example.com"));
        assert!(registry.contains("BLOCKED@EXAMPLE.COM"));
        assert!(!registry.contains("other@example.com"));
    }

    #[test]
    fn file_registry_skips_blanks_and_comments() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("suppressed.txt");
        std::fs::write(&path, "# opt-outs\nBlocked@example.com\n\nsecond@example.com\n")
            .expect("write");

        let registry = InMemorySuppressionList::from_path(&path).expect("load");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("blocked@example.com"));
        assert!(registry.contains("second@example.com"));
    }
}
