//! Nearby-business search providers.
//!
//! The tracker only depends on the [`PlacesSearch`] trait; the shipped
//! implementation talks to the Google Places Nearby Search API.

pub mod places;
pub mod retry;

#[cfg(test)]
pub mod fake;

use crate::error::SearchError;
use crate::models::{Coordinate, Place};
use async_trait::async_trait;

pub use places::{GooglePlacesClient, PlacesClientConfig};
pub use retry::{with_retry, RetryPolicy};

/// A provider that returns rank-ordered businesses near a coordinate.
///
/// Implementations must return results already ordered by relevance and
/// keep business identifiers stable across calls within a run.
#[async_trait]
pub trait PlacesSearch: Send + Sync {
    async fn search(
        &self,
        location: Coordinate,
        radius_meters: u32,
        term: &str,
    ) -> Result<Vec<Place>, SearchError>;
}
