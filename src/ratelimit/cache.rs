//! Process-wide quota cache keyed by API category.
//!
//! Entries expire after a fixed TTL. Expired entries are invisible to readers
//! and are dropped by [`RateLimitCache::purge_expired`] or on the next write.
//! The cache is shared by every job without per-job locking; a stale entry can
//! only cause an extra wait or an extra quota refresh.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::github::{QuotaCategory, RateLimitInfo};

/// Default lifetime of a cached quota entry.
pub const DEFAULT_QUOTA_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CachedQuota {
    info: RateLimitInfo,
    stored_at: Instant,
}

/// Cache of the most recent quota state per category.
#[derive(Debug)]
pub struct RateLimitCache {
    entries: RwLock<HashMap<QuotaCategory, CachedQuota>>,
    ttl: Duration,
}

impl Default for RateLimitCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_TTL)
    }
}

impl RateLimitCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CachedQuota) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }

    /// The cached quota for `category`, if present and not expired.
    pub fn get(&self, category: QuotaCategory) -> Option<RateLimitInfo> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&category)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.info.clone())
    }

    /// Remaining quota as of `now`, or `None` on a cache miss.
    pub fn remaining(&self, category: QuotaCategory, now: DateTime<Utc>) -> Option<u32> {
        self.get(category).map(|info| info.effective_remaining(now))
    }

    /// Store fresh quota metadata for `category`, dropping expired entries.
    pub fn record(&self, category: QuotaCategory, info: RateLimitInfo) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.store(&mut entries, category, info);
    }

    /// Record that `category` has no quota left until `reset_at`.
    pub fn mark_exhausted(&self, category: QuotaCategory, reset_at: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let limit = entries
            .get(&category)
            .map(|entry| entry.info.limit)
            .unwrap_or(0);
        self.store(&mut entries, category, RateLimitInfo::new(limit, 0, reset_at));
    }

    fn store(
        &self,
        entries: &mut HashMap<QuotaCategory, CachedQuota>,
        category: QuotaCategory,
        info: RateLimitInfo,
    ) {
        entries.retain(|_, entry| self.is_fresh(entry));
        entries.insert(
            category,
            CachedQuota {
                info,
                stored_at: Instant::now(),
            },
        );
    }

    /// Decrement the cached remaining count after calls that returned no
    /// quota headers. Does nothing on a miss.
    pub fn consume(&self, category: QuotaCategory, calls: u32) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(&category) {
            entry.info.remaining = entry.info.remaining.saturating_sub(calls);
        }
    }

    pub fn invalidate(&self, category: QuotaCategory) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&category);
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry));
        before - entries.len()
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
