//! ORV consensus node: elections plus cementing.
//!
//! The node is the coordinator that:
//! - Starts elections and routes votes to them
//! - Hands confirmed winners to the confirmation height processor
//! - Cements confirmed blocks and their dependencies in ledger order
//! - Feeds cemented blocks back to elections
//! - Ticks elections and samples online weight on a request loop

pub mod cementing;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use cementing::{
    BoundedCementer, CementObservers, CementationEngine, ConfirmationHeightProcessor,
    UnboundedCementer,
};
pub use config::{ConfirmationHeightConfig, ConfirmationHeightMode, NodeConfig};
pub use error::{CementError, NodeError};
pub use logging::{init_logging, LogFormat};
pub use metrics::ConsensusMetrics;
pub use node::ConsensusNode;
pub use shutdown::ShutdownController;
