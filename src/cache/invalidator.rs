//! Prefix-based bulk eviction.

use std::sync::Arc;

use metrics::counter;
use tracing::info;

use super::store::CacheStore;

const METRIC_CACHE_INVALIDATED: &str = "circle_cache_invalidated_total";

/// Evicts every cache entry under a key prefix.
///
/// Enumeration is cursored and bounded: each round fetches at most
/// `scan_page_size` keys and deletes them before asking for the next
/// page, so a large keyspace never produces one unbounded listing. A
/// read that fetched a doomed key before the eviction started may still
/// serve it, an accepted race; the entry is gone for every read that
/// starts afterwards.
#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<CacheStore>,
    scan_page_size: usize,
}

impl CacheInvalidator {
    pub fn new(store: Arc<CacheStore>, scan_page_size: usize) -> Self {
        Self {
            store,
            scan_page_size: scan_page_size.max(1),
        }
    }

    /// Remove every entry whose key starts with `prefix`, returning the
    /// number removed. A prefix with no matches removes zero; that is
    /// not an error.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut removed = 0;
        let mut cursor: Option<String> = None;

        loop {
            let page = self.store.scan(prefix, cursor.as_deref(), self.scan_page_size);
            if !page.keys.is_empty() {
                removed += self.store.remove_many(&page.keys);
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if removed > 0 {
            counter!(METRIC_CACHE_INVALIDATED).increment(removed as u64);
        }
        info!(prefix, removed, "Cache prefix invalidated");
        removed
    }

    /// Invalidate several prefixes, returning the total removed.
    pub fn invalidate_all(&self, prefixes: &[String]) -> usize {
        prefixes.iter().map(|p| self.invalidate(p)).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn invalidator(page_size: usize) -> (Arc<CacheStore>, CacheInvalidator) {
        let store = Arc::new(CacheStore::new(Duration::from_secs(300)));
        let invalidator = CacheInvalidator::new(store.clone(), page_size);
        (store, invalidator)
    }

    #[test]
    fn removes_every_key_under_the_prefix() {
        let (store, invalidator) = invalidator(100);
        for i in 0..5 {
            store.put(format!("users:a:{i}"), Bytes::from("x"));
        }
        store.put("threads:kept", Bytes::from("x"));

        let removed = invalidator.invalidate("users:");

        assert_eq!(removed, 5);
        assert!(store.scan("users:", None, 100).keys.is_empty());
        assert!(store.get("threads:kept").is_some());
    }

    #[test]
    fn zero_matches_returns_zero() {
        let (_store, invalidator) = invalidator(100);
        assert_eq!(invalidator.invalidate("replies:none:"), 0);
    }

    #[test]
    fn pages_through_keyspaces_larger_than_one_scan() {
        let (store, invalidator) = invalidator(3);
        for i in 0..10 {
            store.put(format!("threads:v:{i:02}"), Bytes::from("x"));
        }

        let removed = invalidator.invalidate("threads:v:");

        assert_eq!(removed, 10);
        assert!(store.is_empty());
    }

    #[test]
    fn invalidate_all_sums_across_prefixes() {
        let (store, invalidator) = invalidator(100);
        store.put("users:a", Bytes::from("x"));
        store.put("user:b", Bytes::from("x"));
        store.put("threads:c", Bytes::from("x"));

        let removed =
            invalidator.invalidate_all(&["users:".to_string(), "user:".to_string()]);

        assert_eq!(removed, 2);
        assert!(store.get("threads:c").is_some());
    }
}
