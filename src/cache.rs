/*
 *  cache.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Shared cache handed to every producer at construction
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::time::Duration;

use mini_moka::sync::Cache;

/// Process-wide content cache shared by all producers.
///
/// Producers that fetch from the network (weather, tickers, scores) park
/// their payloads here so `update()` can be a fast cache read when a
/// background worker feeds the cache instead. Keys are namespaced by
/// producer id.
#[derive(Clone)]
pub struct SharedCache {
    inner: Cache<String, String>,
}

impl SharedCache {
    /// Cache with a sensible default: 10 minute TTL, capped entry count.
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(600))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(4096)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, producer_id: &str, key: &str) -> Option<String> {
        self.inner.get(&Self::scoped(producer_id, key))
    }

    pub fn put(&self, producer_id: &str, key: &str, value: String) {
        self.inner.insert(Self::scoped(producer_id, key), value);
    }

    pub fn invalidate(&self, producer_id: &str, key: &str) {
        self.inner.invalidate(&Self::scoped(producer_id, key));
    }

    fn scoped(producer_id: &str, key: &str) -> String {
        format!("{}:{}", producer_id, key)
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_is_namespaced_by_producer() {
        let cache = SharedCache::new();
        cache.put("weather", "payload", "sunny".to_string());
        cache.put("scores", "payload", "3-1".to_string());

        assert_eq!(cache.get("weather", "payload").as_deref(), Some("sunny"));
        assert_eq!(cache.get("scores", "payload").as_deref(), Some("3-1"));

        cache.invalidate("weather", "payload");
        assert!(cache.get("weather", "payload").is_none());
        assert!(cache.get("scores", "payload").is_some());
    }
}
