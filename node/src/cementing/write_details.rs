use std::collections::VecDeque;

use orv_types::{Account, BlockHash};

/// A contiguous span of one account chain waiting to be cemented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WriteDetails {
    pub account: Account,
    /// Lowest block of the span, the first one not yet cemented.
    pub bottom_height: u64,
    pub bottom_hash: BlockHash,
    /// Desired cemented frontier.
    pub top_height: u64,
    pub top_hash: BlockHash,
}

impl WriteDetails {
    pub fn block_count(&self) -> u64 {
        self.top_height - self.bottom_height + 1
    }
}

/// FIFO of spans in the order their dependencies allow them to be written.
#[derive(Default)]
pub(crate) struct WriteDetailsQueue {
    queue: VecDeque<WriteDetails>,
    total_blocks: u64,
}

impl WriteDetailsQueue {
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push_back(&mut self, details: WriteDetails) {
        debug_assert!(details.top_height >= details.bottom_height);
        self.total_blocks += details.block_count();
        self.queue.push_back(details);
    }

    pub fn pop_front(&mut self) -> Option<WriteDetails> {
        let details = self.queue.pop_front()?;
        self.total_blocks -= details.block_count();
        Some(details)
    }

    /// Blocks covered by every queued span.
    pub fn total_pending_blocks(&self) -> u64 {
        self.total_blocks
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.total_blocks = 0;
    }
}
