use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::labels::ParsedLabels;

/// Bounded map of parse results, evicting the oldest insert first.
///
/// Container labels never change during a container's lifetime, so entries are only dropped
/// by eviction or explicit invalidation.
#[derive(Debug)]
pub(crate) struct LabelCache {
    capacity: usize,
    entries: HashMap<String, Arc<ParsedLabels>>,
    order: VecDeque<String>,
}

impl LabelCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn get(&self, container_id: &str) -> Option<Arc<ParsedLabels>> {
        self.entries.get(container_id).cloned()
    }

    pub(crate) fn insert(&mut self, container_id: &str, parsed: Arc<ParsedLabels>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(container_id.to_string(), parsed).is_none() {
            self.order.push_back(container_id.to_string());
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub(crate) fn remove(&mut self, container_id: &str) {
        if self.entries.remove(container_id).is_some() {
            self.order.retain(|id| id != container_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed() -> Arc<ParsedLabels> {
        Arc::new(ParsedLabels::default())
    }

    #[test]
    fn evicts_oldest_entry() {
        let mut cache = LabelCache::new(2);
        cache.insert("a", parsed());
        cache.insert("b", parsed());
        cache.insert("a", parsed());
        cache.insert("c", parsed());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none(), "oldest insert must be evicted");
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn remove_and_zero_capacity() {
        let mut cache = LabelCache::new(4);
        cache.insert("a", parsed());
        cache.remove("a");
        cache.remove("missing");
        assert_eq!(cache.len(), 0);

        let mut disabled = LabelCache::new(0);
        disabled.insert("a", parsed());
        assert!(disabled.get("a").is_none());
    }
}
