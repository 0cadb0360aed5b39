//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies (clock, storage, background threads) are abstracted
//! behind traits. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod spawner;
pub mod store;

pub use clock::NullClock;
pub use spawner::NullSpawner;
pub use store::NullStore;
