use std::collections::{HashMap, VecDeque};

/// Default capacity for the shared URL cache.
pub const DEFAULT_CAPACITY: usize = 512;

/// Maps short deterministic keys to full URLs so button custom_ids stay
/// under the transport's payload limit. Key derivation is a truncated md5
/// of the URL, so repeated requests for the same link dedupe naturally.
///
/// Bounded LRU: the least recently touched entry is evicted at capacity.
pub struct UrlCache {
    capacity: usize,
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Derive the short cache key for a URL. Same URL always yields the same
/// key; uniqueness beyond md5 collision odds is not guaranteed.
pub fn cache_key(url: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    format!("u_{}", &digest[..8])
}

impl UrlCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Insert the URL and return its key.
    pub fn insert(&mut self, url: &str) -> String {
        let key = cache_key(url);
        if self.entries.contains_key(&key) {
            self.touch(&key);
            return key;
        }
        while self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
        self.entries.insert(key.clone(), url.to_string());
        self.order.push_back(key.clone());
        key
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        let url = self.entries.get(key).cloned()?;
        self.touch(key);
        Some(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).unwrap();
            self.order.push_back(k);
        }
    }
}

impl Default for UrlCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut cache = UrlCache::default();
        let url = "https://youtu.be/abc123";
        let key = cache.insert(url);
        assert_eq!(cache.get(&key).as_deref(), Some(url));
    }

    #[test]
    fn test_round_trip_non_ascii() {
        let mut cache = UrlCache::default();
        let url = "https://youtube.com/watch?v=abc&title=çılgın+şarkı";
        let key = cache.insert(url);
        assert_eq!(cache.get(&key).as_deref(), Some(url));
    }

    #[test]
    fn test_key_is_deterministic_and_short() {
        let url = "https://youtu.be/abc123";
        assert_eq!(cache_key(url), cache_key(url));
        assert_eq!(cache_key(url).len(), 10);
        assert!(cache_key(url).starts_with("u_"));
    }

    #[test]
    fn test_same_url_dedupes() {
        let mut cache = UrlCache::default();
        let k1 = cache.insert("https://youtu.be/abc");
        let k2 = cache.insert("https://youtu.be/abc");
        assert_eq!(k1, k2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let mut cache = UrlCache::new(2);
        let k1 = cache.insert("https://a.example/1");
        let _k2 = cache.insert("https://b.example/2");
        let _k3 = cache.insert("https://c.example/3");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_none());
    }

    #[test]
    fn test_recently_used_survives_eviction() {
        let mut cache = UrlCache::new(2);
        let k1 = cache.insert("https://a.example/1");
        let k2 = cache.insert("https://b.example/2");
        // Touch k1 so k2 becomes the eviction candidate.
        assert!(cache.get(&k1).is_some());
        let _k3 = cache.insert("https://c.example/3");
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k2).is_none());
    }

    #[test]
    fn test_miss_returns_none() {
        let mut cache = UrlCache::default();
        assert!(cache.get("u_deadbeef").is_none());
    }
}
