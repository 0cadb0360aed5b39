//! Recently confirmed elections: stops a finished root from being elected
//! again when late votes or republished blocks arrive.
//!
//! A bounded FIFO of `(root, winner)` pairs. When full, the oldest pair is
//! evicted. Lookups by root or by hash are O(1).

use std::collections::{HashMap, VecDeque};

use orv_types::{BlockHash, QualifiedRoot};

pub struct RecentlyConfirmed {
    by_root: HashMap<QualifiedRoot, BlockHash>,
    by_hash: HashMap<BlockHash, QualifiedRoot>,
    order: VecDeque<(QualifiedRoot, BlockHash)>,
    capacity: usize,
}

impl RecentlyConfirmed {
    pub fn new(capacity: usize) -> Self {
        Self {
            by_root: HashMap::new(),
            by_hash: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Returns false if the root or the hash is already present.
    pub fn put(&mut self, root: QualifiedRoot, hash: BlockHash) -> bool {
        if self.capacity == 0
            || self.by_root.contains_key(&root)
            || self.by_hash.contains_key(&hash)
        {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some((old_root, old_hash)) = self.order.pop_front() {
                self.by_root.remove(&old_root);
                self.by_hash.remove(&old_hash);
            }
        }
        self.by_root.insert(root, hash);
        self.by_hash.insert(hash, root);
        self.order.push_back((root, hash));
        true
    }

    pub fn root_exists(&self, root: &QualifiedRoot) -> bool {
        self.by_root.contains_key(root)
    }

    pub fn hash_exists(&self, hash: &BlockHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn erase(&mut self, hash: &BlockHash) {
        if let Some(root) = self.by_hash.remove(hash) {
            self.by_root.remove(&root);
            self.order.retain(|(_, h)| h != hash);
        }
    }

    /// Most recently inserted pair.
    pub fn back(&self) -> Option<(QualifiedRoot, BlockHash)> {
        self.order.back().copied()
    }

    pub fn clear(&mut self) {
        self.by_root.clear();
        self.by_hash.clear();
        self.order.clear();
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
    use orv_types::Root;

    fn entry(n: u64) -> (QualifiedRoot, BlockHash) {
        (
            QualifiedRoot::new(Root::from_u64(n), BlockHash::from_u64(n)),
            BlockHash::from_u64(1000 + n),
        )
    }

    #[test]
    fn put_and_lookup_both_ways() {
        let mut rc = RecentlyConfirmed::new(10);
        let (root, hash) = entry(1);
        assert!(rc.put(root, hash));
        assert!(rc.root_exists(&root));
        assert!(rc.hash_exists(&hash));
        assert_eq!(rc.back(), Some((root, hash)));
    }

    #[test]
    fn duplicate_root_is_rejected() {
        let mut rc = RecentlyConfirmed::new(10);
        let (root, hash) = entry(1);
        rc.put(root, hash);
        assert!(!rc.put(root, BlockHash::from_u64(77)));
        assert_eq!(rc.len(), 1);
    }

    #[test]
    fn oldest_is_evicted_at_capacity() {
        let mut rc = RecentlyConfirmed::new(2);
        for n in 1..=3 {
            let (root, hash) = entry(n);
            rc.put(root, hash);
        }
        assert_eq!(rc.len(), 2);
        assert!(!rc.root_exists(&entry(1).0));
        assert!(!rc.hash_exists(&entry(1).1));
        assert!(rc.hash_exists(&entry(3).1));
    }

    #[test]
    fn erase_removes_both_indexes() {
        let mut rc = RecentlyConfirmed::new(10);
        let (root, hash) = entry(1);
        rc.put(root, hash);
        rc.erase(&hash);
        assert!(rc.is_empty());
        assert!(!rc.root_exists(&root));
    }
}
