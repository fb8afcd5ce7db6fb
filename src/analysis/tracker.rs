//! Keyword tracking runs.
//!
//! A run samples the grid, searches every point concurrently (with
//! bounded retry), waits for all outcomes or the run deadline, and hands
//! the joined outcomes to the aggregator.

use crate::analysis::aggregate;
use crate::error::TrackError;
use crate::grid::generate_grid_points;
use crate::models::{
    BusinessLocation, GridPoint, PointOutcome, PointSearch, RankingResult, SearchResult,
    TrackedKeyword,
};
use crate::search::{with_retry, PlacesSearch, RetryPolicy};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Failure reason recorded for points cut off by the run deadline.
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Configuration for the tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Maximum point searches in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Upper bound on a whole run; unfinished points count as failed.
    pub run_timeout: Option<Duration>,
    pub show_progress: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            retry: RetryPolicy::default(),
            run_timeout: None,
            show_progress: false,
        }
    }
}

/// Runs geo-grid rank tracking against a search provider.
#[derive(Clone)]
pub struct RankTracker {
    provider: Arc<dyn PlacesSearch>,
    config: TrackerConfig,
}

impl RankTracker {
    pub fn new(provider: Arc<dyn PlacesSearch>, config: TrackerConfig) -> Self {
        Self { provider, config }
    }

    /// Track one keyword for one business location.
    ///
    /// Invalid input is rejected before any search is issued. A run in
    /// which every point failed is an error; a run in which every point
    /// legitimately returned nothing yields zero metrics.
    pub async fn track_keyword(
        &self,
        keyword: &TrackedKeyword,
        location: &BusinessLocation,
    ) -> Result<RankingResult, TrackError> {
        keyword.validate()?;
        location.validate()?;

        let points = generate_grid_points(location.center, keyword.radius_km(), keyword.grid_size);
        info!(
            "Tracking '{}' for {} over {} grid ({} points, {} {})",
            keyword.term,
            location.business_id,
            keyword.grid_size,
            points.len(),
            keyword.radius,
            keyword.unit.abbreviation()
        );

        let searches = self
            .search_points(&points, &keyword.term, keyword.search_radius_meters())
            .await;

        let last_error = searches.iter().rev().find_map(|s| match &s.outcome {
            PointOutcome::Failed(reason) => Some(reason.clone()),
            PointOutcome::Found(_) => None,
        });
        let failed = searches
            .iter()
            .filter(|s| matches!(s.outcome, PointOutcome::Failed(_)))
            .count();

        if !searches.is_empty() && failed == searches.len() {
            return Err(TrackError::AllPointsFailed {
                points: searches.len(),
                last_error: last_error.unwrap_or_default(),
            });
        }
        if failed > 0 {
            warn!(
                "{}/{} grid points failed for '{}'; aggregating the rest",
                failed,
                searches.len(),
                keyword.term
            );
        }

        let result = aggregate(&searches, &location.business_id);
        debug!("Aggregated result: {:?}", result);
        Ok(result)
    }

    /// Search every point and return outcomes in grid order.
    pub async fn search_points(
        &self,
        points: &[GridPoint],
        term: &str,
        radius_meters: u32,
    ) -> Vec<PointSearch> {
        let policy = self.config.retry;
        let progress = self.progress_bar(points.len());

        let searches: Vec<_> = points
            .iter()
            .copied()
            .enumerate()
            .map(|(index, point)| {
                let provider = Arc::clone(&self.provider);
                let term = term.to_string();
                async move {
                    let label = format!("point ({},{})", point.row, point.col);
                    let result = with_retry(policy, &label, || {
                        provider.search(point.coordinate, radius_meters, &term)
                    })
                    .await;

                    let outcome = match result {
                        Ok(places) => PointOutcome::Found(SearchResult::ranked(places)),
                        Err(e) => {
                            warn!("{} at {} failed: {}", label, point.coordinate, e);
                            PointOutcome::Failed(e.to_string())
                        }
                    };
                    (index, outcome)
                }
            })
            .collect();

        let mut pending = stream::iter(searches).buffer_unordered(self.config.concurrency.max(1));

        let deadline = self
            .config
            .run_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        let mut outcomes: Vec<Option<PointOutcome>> = vec![None; points.len()];

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Run deadline reached; abandoning in-flight point searches");
                        break;
                    }
                },
                None => pending.next().await,
            };

            match next {
                Some((index, outcome)) => {
                    outcomes[index] = Some(outcome);
                    progress.inc(1);
                }
                None => break,
            }
        }

        // Dropping the stream cancels whatever is still in flight.
        drop(pending);
        progress.finish_and_clear();

        points
            .iter()
            .zip(outcomes)
            .map(|(point, outcome)| PointSearch {
                point: *point,
                outcome: outcome
                    .unwrap_or_else(|| PointOutcome::Failed(DEADLINE_EXCEEDED.to_string())),
            })
            .collect()
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} points")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
