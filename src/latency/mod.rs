//! Pairwise link-cost datasets.
//!
//! A latency dataset is loaded once per batch and shared read-only by every
//! trial. Infeasible or unmeasured links carry the [`INFEASIBLE`] sentinel.

pub mod cache;
pub mod matrix;

pub use cache::{load_cache, load_matching_cache, save_cache, CacheKey};
pub use matrix::{IndexBase, LatencyError, LatencyMatrix, INFEASIBLE};
