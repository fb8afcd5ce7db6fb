//! Rank aggregation and visibility metrics.
//!
//! Reduces per-point search outcomes into one [`RankingResult`]. The
//! reduction is pure and order-independent: observations are grouped in
//! ordered maps so identical input always yields identical output.

use crate::models::{
    CompetitorRanking, Coverage, PointOutcome, PointSearch, RankingResult, SearchResult,
};
use std::collections::BTreeMap;

/// Competitors kept in a result.
pub const MAX_COMPETITORS: usize = 10;

/// Rank at or above which an observation counts toward avgAGR.
pub const AGR_TOP_RANK: u32 = 5;

/// Rank at or above which an observation counts toward ATGR.
pub const ATGR_TOP_RANK: u32 = 3;

/// All observations of one business across the grid.
#[derive(Debug, Clone, Default)]
struct BusinessObservations {
    name: String,
    ranks: Vec<u32>,
}

impl BusinessObservations {
    fn composite_rank(&self) -> u32 {
        composite_rank(&self.ranks)
    }
}

/// Rounded mean of observed ranks; 0 when there are none.
pub fn composite_rank(ranks: &[u32]) -> u32 {
    if ranks.is_empty() {
        return 0;
    }
    let sum: u64 = ranks.iter().map(|&r| u64::from(r)).sum();
    (sum as f64 / ranks.len() as f64).round() as u32
}

/// Percentage of `ranks` at or better than `threshold`.
pub fn share_within(ranks: &[u32], threshold: u32) -> f64 {
    if ranks.is_empty() {
        return 0.0;
    }
    let hits = ranks.iter().filter(|&&r| r <= threshold).count();
    hits as f64 / ranks.len() as f64 * 100.0
}

/// Share of local voice: rank-weighted share of all observations, in percent.
pub fn share_of_local_voice(target_ranks: &[u32], total_observations: usize) -> f64 {
    if target_ranks.is_empty() || total_observations == 0 {
        return 0.0;
    }
    let weight: f64 = target_ranks.iter().map(|&r| 1.0 / f64::from(r.max(1))).sum();
    weight / total_observations as f64 * 100.0
}

/// Group every successful observation by business id.
fn group_by_business<'a, I>(results: I) -> BTreeMap<String, BusinessObservations>
where
    I: IntoIterator<Item = &'a SearchResult>,
{
    let mut grouped: BTreeMap<String, BusinessObservations> = BTreeMap::new();

    for result in results {
        let entry = grouped.entry(result.business_id.clone()).or_default();
        if entry.name.is_empty() {
            entry.name = result.name.clone();
        }
        entry.ranks.push(result.rank);
    }

    grouped
}

/// Sort competitors best-first and keep the top `n`.
///
/// Ties are broken by appearances (more first), then business id.
pub fn top_competitors(mut competitors: Vec<CompetitorRanking>, n: usize) -> Vec<CompetitorRanking> {
    competitors.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| b.appearances.cmp(&a.appearances))
            .then_with(|| a.business_id.cmp(&b.business_id))
    });
    competitors.truncate(n);
    competitors
}

/// Reduce point outcomes into the target business's ranking.
///
/// Failed points contribute no observations and are counted in
/// [`Coverage::points_failed`]. A target that never appears gets zero
/// metrics.
pub fn aggregate(searches: &[PointSearch], target_business_id: &str) -> RankingResult {
    let found: Vec<&Vec<SearchResult>> = searches
        .iter()
        .filter_map(|s| match &s.outcome {
            PointOutcome::Found(results) => Some(results),
            PointOutcome::Failed(_) => None,
        })
        .collect();

    let total_observations: usize = found.iter().map(|r| r.len()).sum();
    let mut grouped = group_by_business(found.iter().flat_map(|r| r.iter()));

    let target = grouped.remove(target_business_id).unwrap_or_default();

    let competitors = grouped
        .into_iter()
        .map(|(business_id, obs)| CompetitorRanking {
            rank: obs.composite_rank(),
            appearances: obs.ranks.len(),
            name: obs.name,
            business_id,
        })
        .collect();

    RankingResult {
        rank: target.composite_rank(),
        avg_agr: share_within(&target.ranks, AGR_TOP_RANK),
        atgr: share_within(&target.ranks, ATGR_TOP_RANK),
        solv: share_of_local_voice(&target.ranks, total_observations),
        competitors: top_competitors(competitors, MAX_COMPETITORS),
        coverage: Coverage {
            points_total: searches.len(),
            points_searched: found.len(),
            points_failed: searches.len() - found.len(),
            target_appearances: target.ranks.len(),
            total_observations,
        },
    }
}
