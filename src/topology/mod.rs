//! Overlay topology module.
//!
//! This module contains the overlay graph itself, the two construction
//! modes (unconstrained random and latency-constrained saturation), and the
//! churn operators that mutate a graph between measurement rounds.

pub mod builder;
pub mod churn;
pub mod saturation;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::{BuildError, BuildOutcome, RandomBuilder};
pub use churn::{kill_nodes, reboot, RebootOutcome};
pub use saturation::{SaturatedBuild, Saturator};
pub use types::{NodeId, OverlayGraph};
