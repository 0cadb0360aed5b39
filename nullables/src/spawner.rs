//! Nullable spawner: runs background tasks on the calling thread.

use orv_utils::{Spawner, Task};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct NullSpawner {
    spawned: AtomicUsize,
}

impl NullSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks run so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl Spawner for NullSpawner {
    fn spawn(&self, task: Task) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        task();
    }
}
