use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::state::JobStats;

const WILDCARD_MARKER: &str = "*.";

/// A root domain after normalization. Identity key for domain jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootDomain(String);

impl RootDomain {
    /// Normalizes a raw domain string.
    ///
    /// Leading wildcard label markers (`*.`) and surrounding whitespace are
    /// removed. Case and everything else is preserved. Applying this to an
    /// already normalized domain returns it unchanged.
    pub fn normalize(raw: &str) -> Self {
        let mut domain = raw.trim();
        while let Some(rest) = domain.strip_prefix(WILDCARD_MARKER) {
            domain = rest.trim();
        }
        Self(domain.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RootDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RootDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`RootDomain::normalize`].
pub fn normalize(raw: &str) -> RootDomain {
    RootDomain::normalize(raw)
}

/// Session-wide registry of root domains that already own a job.
///
/// Registration is keyed on the normalized domain alone and there is no
/// removal, so a domain is scanned at most once per session.
#[derive(Debug, Default)]
pub struct TargetManager {
    order: Vec<RootDomain>,
    stats: HashMap<RootDomain, Arc<JobStats>>,
}

impl TargetManager {
    /// Creates a new, empty `TargetManager`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a domain and returns its fresh stats handle, or `None` if the
    /// domain is empty or was registered before.
    pub fn register(&mut self, domain: &RootDomain) -> Option<Arc<JobStats>> {
        if domain.is_empty() || self.stats.contains_key(domain) {
            return None;
        }
        let stats = Arc::new(JobStats::new());
        self.stats.insert(domain.clone(), Arc::clone(&stats));
        self.order.push(domain.clone());
        Some(stats)
    }

    pub fn stats(&self, domain: &RootDomain) -> Option<Arc<JobStats>> {
        self.stats.get(domain).cloned()
    }

    /// Registered domains with their stats, in registration order.
    pub fn entries(&self) -> Vec<(RootDomain, Arc<JobStats>)> {
        self.order
            .iter()
            .filter_map(|d| self.stats.get(d).map(|s| (d.clone(), Arc::clone(s))))
            .collect()
    }

    /// Number of registered domains.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
