//! Rolling set of recently seen transaction ids.
//!
//! Keeps the last `capacity` ids in insertion order so the polling peer
//! announces each mempool transaction once, without growing forever.

use std::collections::{HashSet, VecDeque};

use hummingbird_types::TxHash;

/// Default capacity: a little above a full mempool on a busy day.
pub const DEFAULT_SEEN_CAPACITY: usize = 300_000;

#[derive(Debug)]
pub struct SeenSet {
    capacity: usize,
    ids: HashSet<TxHash>,
    order: VecDeque<TxHash>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `id`. Returns `true` if it had not been seen before.
    pub fn insert(&mut self, id: TxHash) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.ids.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        self.ids.insert(id);
        self.order.push_back(id);
        true
    }

    pub fn contains(&self, id: &TxHash) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> TxHash {
        TxHash::new([n; 32])
    }

    #[test]
    fn first_insert_is_new_second_is_not() {
        let mut seen = SeenSet::new(10);
        assert!(seen.insert(id(1)));
        assert!(!seen.insert(id(1)));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn oldest_is_evicted_at_capacity() {
        let mut seen = SeenSet::new(2);
        seen.insert(id(1));
        seen.insert(id(2));
        seen.insert(id(3));
        assert!(!seen.contains(&id(1)));
        assert!(seen.contains(&id(2)));
        assert!(seen.contains(&id(3)));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn zero_capacity_still_tracks_latest() {
        let mut seen = SeenSet::new(0);
        assert!(seen.insert(id(1)));
        assert!(!seen.insert(id(1)));
    }
}
