//! Rank analysis.
//!
//! `tracker` fans point searches out and back in; `aggregator` turns the
//! joined outcomes into visibility metrics.

pub mod aggregator;
pub mod tracker;

pub use aggregator::aggregate;
pub use tracker::{RankTracker, TrackerConfig};
