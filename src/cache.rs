use dashmap::DashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_ENTRIES: usize = 256;

struct CachedPage {
    expires_at: Instant,
    body: String,
}

impl CachedPage {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Rendered responses keyed by a normalised page key, each valid for a fixed
/// time-to-live. A zero TTL turns the cache off.
pub struct PageCache {
    ttl: Duration,
    max_entries: usize,
    pages: DashMap<String, CachedPage>,
}

impl PageCache {
    pub fn new(ttl: Duration, max_entries: usize) -> PageCache {
        PageCache {
            ttl,
            max_entries: max_entries.max(1),
            pages: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let fresh = self
            .pages
            .get(key)
            .filter(|page| !page.is_expired())
            .map(|page| page.body.clone());
        if fresh.is_none() {
            self.pages.remove_if(key, |_, page| page.is_expired());
        }
        fresh
    }

    pub fn insert(&self, key: String, body: String) {
        if !self.is_enabled() {
            return;
        }
        self.enforce_limits(&key);
        self.pages.insert(
            key,
            CachedPage {
                expires_at: Instant::now() + self.ttl,
                body,
            },
        );
    }

    // Expired pages go first; if the cache is still full the page closest to
    // expiry makes room.
    fn enforce_limits(&self, incoming: &str) {
        self.pages.retain(|_, page| !page.is_expired());
        if self.pages.len() < self.max_entries || self.pages.contains_key(incoming) {
            return;
        }
        let oldest = self
            .pages
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            tracing::debug!("page cache full, evicting {}", key);
            self.pages.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn serves_stored_page_until_expiry() {
        let cache = PageCache::new(Duration::from_millis(50), DEFAULT_MAX_ENTRIES);
        cache.insert("index:1".to_owned(), "first".to_owned());
        assert_eq!(cache.get("index:1").as_deref(), Some("first"));
        sleep(Duration::from_millis(80));
        assert_eq!(cache.get("index:1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let cache = PageCache::new(Duration::from_secs(60), DEFAULT_MAX_ENTRIES);
        cache.insert("index:2".to_owned(), "two".to_owned());
        assert_eq!(cache.get("index:1"), None);
        assert_eq!(cache.get("index:2").as_deref(), Some("two"));
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = PageCache::new(Duration::ZERO, DEFAULT_MAX_ENTRIES);
        cache.insert("index:1".to_owned(), "body".to_owned());
        assert_eq!(cache.get("index:1"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn never_grows_past_its_limit() {
        let cache = PageCache::new(Duration::from_secs(60), 3);
        for n in 0..50 {
            cache.insert(format!("index:{}", n), n.to_string());
            assert!(cache.len() <= 3);
        }
        // the newest page always survives
        assert_eq!(cache.get("index:49").as_deref(), Some("49"));
        assert_eq!(cache.get("index:0"), None);
    }

    #[test]
    fn refreshing_a_key_in_a_full_cache_evicts_nothing() {
        let cache = PageCache::new(Duration::from_secs(60), 2);
        cache.insert("index:1".to_owned(), "a".to_owned());
        cache.insert("index:2".to_owned(), "b".to_owned());
        cache.insert("index:2".to_owned(), "c".to_owned());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("index:1").as_deref(), Some("a"));
        assert_eq!(cache.get("index:2").as_deref(), Some("c"));
    }

    #[test]
    fn expired_pages_are_dropped_on_insert() {
        let cache = PageCache::new(Duration::from_millis(30), DEFAULT_MAX_ENTRIES);
        cache.insert("index:1".to_owned(), "old".to_owned());
        cache.insert("index:2".to_owned(), "old".to_owned());
        sleep(Duration::from_millis(60));
        cache.insert("index:3".to_owned(), "new".to_owned());
        assert_eq!(cache.len(), 1);
    }
}
