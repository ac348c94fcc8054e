//! Bounded replay cache for retried transport deliveries.

use std::collections::{HashMap, VecDeque};

/// Remembers the reply sent for the last `capacity` message keys.
/// The oldest key is evicted first.
#[derive(Debug)]
pub struct ReplayCache {
    capacity: usize,
    order: VecDeque<String>,
    replies: HashMap<String, String>,
}

impl ReplayCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(4096)),
            replies: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.replies.get(key).map(|s| s.as_str())
    }

    pub fn insert(&mut self, key: String, reply: String) {
        if self.capacity == 0 {
            return;
        }
        if let Some(existing) = self.replies.get_mut(&key) {
            *existing = reply;
            return;
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.replies.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.replies.insert(key, reply);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut cache = ReplayCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("c".into(), "3".into());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c"), Some("3"));
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let mut cache = ReplayCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("a".into(), "2".into());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some("2"));
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut cache = ReplayCache::new(0);
        cache.insert("a".into(), "1".into());
        assert!(cache.is_empty());
    }
}
