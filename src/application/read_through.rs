//! Read-through cache helper shared by the query paths.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::application::error::AppError;
use crate::application::repos::RepoError;
use crate::cache::CacheStore;

/// Serve `key` from the cache, or compute the page, cache it, and return
/// it. Entries are only written on a miss; a hit never rewrites or
/// refreshes the TTL. Cache faults (an undecodable resident entry, a
/// value that will not serialize) are logged and degrade to the computed
/// result; they never fail the read.
pub(crate) async fn read_through<T, F>(
    cache: &CacheStore,
    key: &str,
    fetch: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned,
    F: AsyncFnOnce() -> Result<T, RepoError>,
{
    if let Some(body) = cache.get(key) {
        match serde_json::from_slice(&body) {
            Ok(value) => {
                debug!(key, "Cache hit");
                return Ok(value);
            }
            Err(err) => {
                warn!(key, error = %err, "Discarding undecodable cache entry");
            }
        }
    }

    let value = fetch().await?;
    store_page(cache, key, &value);
    Ok(value)
}

fn store_page<T: Serialize>(cache: &CacheStore, key: &str, value: &T) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            cache.put(key, Bytes::from(body));
            debug!(key, "Cache miss, page stored");
        }
        Err(err) => warn!(key, error = %err, "Skipping cache write for unserializable page"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn cache() -> CacheStore {
        CacheStore::new(Duration::from_secs(300))
    }

    #[tokio::test]
    async fn miss_computes_and_populates() {
        let cache = cache();

        let value: Vec<u32> =
            read_through(&cache, "users:x", async || Ok(vec![1, 2, 3]))
                .await
                .expect("read through");

        assert_eq!(value, vec![1, 2, 3]);
        assert!(cache.get("users:x").is_some());
    }

    #[tokio::test]
    async fn hit_skips_the_fetch() {
        let cache = cache();
        let _: Vec<u32> = read_through(&cache, "users:x", async || Ok(vec![1]))
            .await
            .expect("seed");

        let value: Vec<u32> = read_through(&cache, "users:x", async || {
            panic!("fetch must not run on a hit")
        })
        .await
        .expect("read through");

        assert_eq!(value, vec![1]);
    }

    #[tokio::test]
    async fn undecodable_entry_degrades_to_fetch() {
        let cache = cache();
        cache.put("users:x", Bytes::from("not json"));

        let value: Vec<u32> = read_through(&cache, "users:x", async || Ok(vec![7]))
            .await
            .expect("read through");

        assert_eq!(value, vec![7]);
    }
}
