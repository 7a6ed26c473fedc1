//! Cache of User-Agent verdicts.
//!
//! Classification is deterministic, so a cached verdict is always the one the
//! classifier would produce again; the cache only saves the token scan for
//! repeat visitors.

use crate::detectors::{Classification, UserAgentClassifier};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Bounded, TTL'd verdict cache keyed by the raw User-Agent string.
pub struct VerdictCache {
    inner: Cache<String, Classification>,
    classifier: Arc<UserAgentClassifier>,
}

impl VerdictCache {
    /// Create a new cache in front of `classifier`.
    pub fn new(classifier: Arc<UserAgentClassifier>, max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { inner, classifier }
    }

    /// Cached verdict for `user_agent`, classifying on a miss.
    pub async fn classify(&self, user_agent: &str) -> Classification {
        if let Some(cached) = self.inner.get(user_agent).await {
            return cached;
        }

        let result = self.classifier.classify(user_agent);
        self.inner.insert(user_agent.to_string(), result.clone()).await;
        result
    }

    /// Cached verdict without classifying.
    pub async fn peek(&self, user_agent: &str) -> Option<Classification> {
        self.inner.get(user_agent).await
    }

    /// Approximate number of cached verdicts.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Drop every cached verdict.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
