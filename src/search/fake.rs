//! Scripted [`PlacesSearch`] used by tests.

use super::PlacesSearch;
use crate::error::SearchError;
use crate::models::{Coordinate, Place};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Responds per coordinate (keyed by `Coordinate`'s `Display`).
#[derive(Default)]
pub struct FakePlaces {
    responses: HashMap<String, Vec<Place>>,
    default: Vec<Place>,
    transient_failures: Mutex<HashMap<String, u32>>,
    permanent_failures: HashSet<String>,
    fail_all: Option<SearchError>,
    slow: HashMap<String, Duration>,
    calls: AtomicUsize,
}

pub fn places(ids: &[&str]) -> Vec<Place> {
    ids.iter()
        .map(|id| Place {
            business_id: id.to_string(),
            name: format!("Business {}", id),
        })
        .collect()
}

impl FakePlaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, ids: &[&str]) -> Self {
        self.default = places(ids);
        self
    }

    pub fn respond(mut self, at: Coordinate, ids: &[&str]) -> Self {
        self.responses.insert(at.to_string(), places(ids));
        self
    }

    /// Fail the first `times` calls at `at` with a transient error.
    pub fn flaky(self, at: Coordinate, times: u32) -> Self {
        if let Ok(mut failures) = self.transient_failures.lock() {
            failures.insert(at.to_string(), times);
        }
        self
    }

    pub fn broken(mut self, at: Coordinate) -> Self {
        self.permanent_failures.insert(at.to_string());
        self
    }

    pub fn fail_all(mut self, error: SearchError) -> Self {
        self.fail_all = Some(error);
        self
    }

    pub fn slow(mut self, at: Coordinate, delay: Duration) -> Self {
        self.slow.insert(at.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlacesSearch for FakePlaces {
    async fn search(
        &self,
        location: Coordinate,
        _radius_meters: u32,
        _term: &str,
    ) -> Result<Vec<Place>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = location.to_string();

        if let Some(delay) = self.slow.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(ref error) = self.fail_all {
            return Err(error.clone());
        }
        if self.permanent_failures.contains(&key) {
            return Err(SearchError::Permanent("INVALID_REQUEST".to_string()));
        }
        if let Ok(mut failures) = self.transient_failures.lock() {
            if let Some(remaining) = failures.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SearchError::Transient("UNKNOWN_ERROR".to_string()));
                }
            }
        }

        Ok(self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}
