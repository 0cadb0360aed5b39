//! Bounded history of cemented election outcomes, newest last.

use std::collections::VecDeque;

use crate::election_status::ElectionStatus;

pub struct RecentlyCemented {
    statuses: VecDeque<ElectionStatus>,
    capacity: usize,
}

impl RecentlyCemented {
    pub fn new(capacity: usize) -> Self {
        Self {
            statuses: VecDeque::new(),
            capacity,
        }
    }

    pub fn put(&mut self, status: ElectionStatus) {
        if self.capacity == 0 {
            return;
        }
        if self.statuses.len() >= self.capacity {
            self.statuses.pop_front();
        }
        self.statuses.push_back(status);
    }

    pub fn list(&self) -> Vec<ElectionStatus> {
        self.statuses.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}
