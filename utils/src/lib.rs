//! Shared utilities: statistics counters, observer fan-out and background
//! task spawning.

pub mod background;
pub mod observers;
pub mod stats;

pub use background::{Spawner, Task, ThreadPool};
pub use observers::ObserverSet;
pub use stats::{DetailType, StatType, Stats};
