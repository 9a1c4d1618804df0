//! TTL'd key-value storage for rendered result pages.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use metrics::counter;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_CACHE_HIT: &str = "circle_cache_hit_total";
const METRIC_CACHE_MISS: &str = "circle_cache_miss_total";

struct CacheEntry {
    body: Bytes,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// One page of a cursored key enumeration.
///
/// `cursor` is `Some` while more keys remain; feeding it back into
/// [`CacheStore::scan`] resumes after the last returned key. `None`
/// signals completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

/// In-process key-value cache with a fixed TTL per entry.
///
/// Keys are ordered, which is what makes bounded prefix scans possible:
/// all keys sharing a prefix are contiguous, so a scan never touches the
/// rest of the keyspace. An expired entry is treated as absent everywhere
/// (reads, scans, removal counts) and is dropped lazily on access.
pub struct CacheStore {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            ttl,
        }
    }

    /// Fetch a live entry. Expired entries count as misses and are
    /// dropped on the way out.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(entry.body.clone())
            }
            Some(_) => {
                entries.remove(key);
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    /// Store a rendered page under `key` with the configured TTL.
    pub fn put(&self, key: impl Into<String>, body: Bytes) {
        self.put_with_ttl(key, body, self.ttl);
    }

    /// Store with an explicit TTL. The entry replaces any previous value
    /// under the same key and expires `ttl` from now.
    pub fn put_with_ttl(&self, key: impl Into<String>, body: Bytes, ttl: Duration) {
        let entry = CacheEntry {
            body,
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "put").insert(key.into(), entry);
    }

    /// Enumerate up to `limit` live keys starting with `prefix`, resuming
    /// after `cursor` when one is supplied.
    pub fn scan(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> ScanPage {
        let now = Instant::now();
        let entries = rw_read(&self.entries, SOURCE, "scan");

        let lower = match cursor {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut keys = Vec::new();
        let mut cursor = None;
        for (key, entry) in entries.range::<String, _>((lower, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            if entry.is_expired(now) {
                continue;
            }
            if keys.len() == limit {
                // More live keys remain; resume after the last returned.
                cursor = keys.last().cloned();
                break;
            }
            keys.push(key.clone());
        }

        ScanPage { keys, cursor }
    }

    /// Remove the given keys, returning how many live entries were
    /// actually dropped. Expired residents are dropped but not counted.
    pub fn remove_many(&self, keys: &[String]) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "remove_many");
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key)
                && !entry.is_expired(now)
            {
                removed += 1;
            }
        }
        removed
    }

    /// Number of resident entries, expired or not. Test observability.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CacheStore {
        CacheStore::new(Duration::from_secs(300))
    }

    #[test]
    fn get_returns_what_put_stored() {
        let store = store();
        assert!(store.get("threads:a").is_none());

        store.put("threads:a", Bytes::from("[1]"));
        assert_eq!(store.get("threads:a"), Some(Bytes::from("[1]")));
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let store = store();
        store.put_with_ttl("threads:a", Bytes::from("[1]"), Duration::ZERO);

        assert!(store.get("threads:a").is_none());
        // The expired resident was dropped by the read.
        assert!(store.is_empty());
    }

    #[test]
    fn put_replaces_in_place() {
        let store = store();
        store.put("users:q", Bytes::from("old"));
        store.put("users:q", Bytes::from("new"));

        assert_eq!(store.get("users:q"), Some(Bytes::from("new")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn scan_is_bounded_and_resumable() {
        let store = store();
        for i in 0..7 {
            store.put(format!("replies:t:{i}"), Bytes::from("x"));
        }
        store.put("threads:a", Bytes::from("x"));

        let first = store.scan("replies:t:", None, 3);
        assert_eq!(first.keys.len(), 3);
        let cursor = first.cursor.expect("more keys remain");

        let second = store.scan("replies:t:", Some(&cursor), 3);
        assert_eq!(second.keys.len(), 3);

        let third = store.scan("replies:t:", second.cursor.as_deref(), 3);
        assert_eq!(third.keys.len(), 1);
        assert!(third.cursor.is_none());

        // No overlap between pages and nothing outside the prefix.
        let mut all = first.keys;
        all.extend(second.keys);
        all.extend(third.keys);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 7);
        assert!(all.iter().all(|k| k.starts_with("replies:t:")));
    }

    #[test]
    fn scan_skips_expired_entries() {
        let store = store();
        store.put("users:a", Bytes::from("x"));
        store.put_with_ttl("users:b", Bytes::from("x"), Duration::ZERO);
        store.put("users:c", Bytes::from("x"));

        let page = store.scan("users:", None, 10);
        assert_eq!(page.keys, vec!["users:a".to_string(), "users:c".to_string()]);
    }

    #[test]
    fn remove_many_counts_only_live_entries() {
        let store = store();
        store.put("user:a", Bytes::from("x"));
        store.put_with_ttl("user:b", Bytes::from("x"), Duration::ZERO);

        let removed = store.remove_many(&[
            "user:a".to_string(),
            "user:b".to_string(),
            "user:missing".to_string(),
        ]);
        assert_eq!(removed, 1);
        assert!(store.is_empty());
    }
}
