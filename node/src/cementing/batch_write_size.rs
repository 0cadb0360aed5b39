use std::time::Duration;

/// Target duration for holding the write token during one cementing batch.
const MAXIMUM_BATCH_WRITE_TIME: Duration = Duration::from_millis(250);

/// Below this the batch grows, above the maximum it shrinks.
const MAXIMUM_BATCH_WRITE_TIME_INCREASE_CUTOFF: Duration = Duration::from_millis(200);

/// Number of blocks cemented per write transaction, adjusted by 10% steps
/// so a batch takes roughly [`MAXIMUM_BATCH_WRITE_TIME`].
pub(crate) struct BatchWriteSizeManager {
    size: usize,
    minimum: usize,
}

impl BatchWriteSizeManager {
    pub fn new(minimum: usize) -> Self {
        let minimum = minimum.max(1);
        Self {
            size: minimum,
            minimum,
        }
    }

    pub fn current(&self) -> usize {
        self.size
    }

    /// Feed back how long writing `written` blocks took.
    pub fn adjust(&mut self, elapsed: Duration, written: usize) {
        let step = self.size / 10;
        if elapsed > MAXIMUM_BATCH_WRITE_TIME {
            self.size = self.size.saturating_sub(step).max(self.minimum);
        } else if elapsed < MAXIMUM_BATCH_WRITE_TIME_INCREASE_CUTOFF && written >= self.size {
            self.size += step;
        }
    }
}
