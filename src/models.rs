//! Data models for the rank tracker.
//!
//! This module contains the core data structures used throughout the
//! application: tracked keywords, grid geometry, per-point search
//! outcomes, aggregated rankings, and persisted snapshots.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kilometers per statute mile.
pub const KM_PER_MILE: f64 = 1.609_344;

/// Largest radius the Places nearby search accepts, in meters.
pub const MAX_SEARCH_RADIUS_METERS: u32 = 50_000;

/// Largest number of rows or columns in a grid. Each point is one search.
pub const MAX_GRID_DIMENSION: u32 = 25;

/// Unit the keyword's radius is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    #[serde(alias = "km")]
    #[value(alias = "km")]
    Kilometers,
    #[serde(alias = "mi")]
    #[value(alias = "mi")]
    Miles,
}

impl DistanceUnit {
    /// Convert a distance in this unit to kilometers.
    pub fn to_km(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => value,
            DistanceUnit::Miles => value * KM_PER_MILE,
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceUnit::Kilometers => write!(f, "kilometers"),
            DistanceUnit::Miles => write!(f, "miles"),
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "km" | "kilometer" | "kilometers" => Ok(DistanceUnit::Kilometers),
            "mi" | "mile" | "miles" => Ok(DistanceUnit::Miles),
            other => Err(ValidationError::Unit(other.to_string())),
        }
    }
}

/// Grid dimensions, written as `"<rows>x<cols>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl GridSize {
    pub fn new(rows: u32, cols: u32) -> Result<Self, ValidationError> {
        let in_range = |n: u32| (1..=MAX_GRID_DIMENSION).contains(&n);
        if !in_range(rows) || !in_range(cols) {
            return Err(ValidationError::GridSize(format!("{}x{}", rows, cols)));
        }
        Ok(Self { rows, cols })
    }

    /// Total number of sample points.
    pub fn point_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl FromStr for GridSize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::GridSize(s.to_string());

        let (rows, cols) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;

        let rows: u32 = rows.trim().parse().map_err(|_| invalid())?;
        let cols: u32 = cols.trim().parse().map_err(|_| invalid())?;

        GridSize::new(rows, cols).map_err(|_| invalid())
    }
}

impl TryFrom<String> for GridSize {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GridSize> for String {
    fn from(size: GridSize) -> Self {
        size.to_string()
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check the coordinate is usable as a grid center.
    ///
    /// The poles are rejected: the longitude correction divides by cos(lat).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || self.lat <= -90.0 || self.lat >= 90.0 {
            return Err(ValidationError::Latitude(self.lat));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ValidationError::Longitude(self.lng));
        }
        Ok(())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

/// One sample coordinate, with its position in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub row: u32,
    pub col: u32,
    pub coordinate: Coordinate,
}

/// A search term scoped to one business location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedKeyword {
    /// Stable key for history and scheduling.
    pub id: String,
    pub term: String,
    pub grid_size: GridSize,
    pub radius: f64,
    #[serde(default)]
    pub unit: DistanceUnit,
}

impl TrackedKeyword {
    /// Validate everything that must hold before searches are issued.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.term.trim().is_empty() {
            return Err(ValidationError::Empty("Search term"));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ValidationError::Radius(self.radius));
        }
        // Catches zero dimensions on values built without FromStr.
        GridSize::new(self.grid_size.rows, self.grid_size.cols)?;
        Ok(())
    }

    pub fn radius_km(&self) -> f64 {
        self.unit.to_km(self.radius)
    }

    /// Radius handed to each point-level search, in meters.
    pub fn search_radius_meters(&self) -> u32 {
        let meters = (self.radius_km() * 1000.0).round();
        if meters >= MAX_SEARCH_RADIUS_METERS as f64 {
            MAX_SEARCH_RADIUS_METERS
        } else {
            (meters as u32).max(1)
        }
    }

    /// Derive an id from the term and geometry when none was configured.
    pub fn default_id(term: &str, grid_size: GridSize, radius: f64, unit: DistanceUnit) -> String {
        let slug: String = term
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("{}-{}-{}{}", slug, grid_size, radius, unit.abbreviation())
    }
}

/// The business whose visibility is being measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessLocation {
    pub business_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub center: Coordinate,
}

impl BusinessLocation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.business_id.trim().is_empty() {
            return Err(ValidationError::Empty("Business id"));
        }
        self.center.validate()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.business_id)
    }
}

/// A business returned by the search provider, in provider order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub business_id: String,
    pub name: String,
}

/// One ranked hit at one grid point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub business_id: String,
    pub name: String,
    /// 1-based position in that point's result list.
    pub rank: u32,
}

impl SearchResult {
    /// Assign 1-based ranks to provider-ordered places.
    pub fn ranked(places: Vec<Place>) -> Vec<SearchResult> {
        places
            .into_iter()
            .zip(1u32..)
            .map(|(place, rank)| SearchResult {
                business_id: place.business_id,
                name: place.name,
                rank,
            })
            .collect()
    }
}

/// What happened when one grid point was searched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum PointOutcome {
    /// The search completed; an empty list is a legitimate "no matches".
    Found(Vec<SearchResult>),
    /// Retries were exhausted or the run was cut short.
    Failed(String),
}

/// A grid point paired with its search outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSearch {
    pub point: GridPoint,
    pub outcome: PointOutcome,
}

/// A competing business's composite rank in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRanking {
    pub business_id: String,
    pub name: String,
    pub rank: u32,
    /// Number of grid points the business appeared at.
    pub appearances: usize,
}

/// How much of the grid produced data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub points_total: usize,
    pub points_searched: usize,
    pub points_failed: usize,
    pub target_appearances: usize,
    pub total_observations: usize,
}

/// Aggregated visibility of the target business for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    /// Rounded mean rank; 0 means the target was never observed.
    pub rank: u32,
    /// Percentage of target observations ranked 5 or better.
    pub avg_agr: f64,
    /// Percentage of target observations ranked 3 or better.
    pub atgr: f64,
    /// Share of local voice, as a percentage.
    pub solv: f64,
    pub competitors: Vec<CompetitorRanking>,
    pub coverage: Coverage,
}

impl RankingResult {
    /// True when the target was not observed at any searched point.
    pub fn is_no_data(&self) -> bool {
        self.coverage.target_appearances == 0
    }
}

/// One persisted tracking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub keyword_id: String,
    pub term: String,
    pub business_id: String,
    pub rank: u32,
    pub avg_agr: f64,
    pub atgr: f64,
    pub solv: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub competitors: Vec<CompetitorRanking>,
}

impl RankingSnapshot {
    pub fn from_result(
        keyword: &TrackedKeyword,
        location: &BusinessLocation,
        result: &RankingResult,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            keyword_id: keyword.id.clone(),
            term: keyword.term.clone(),
            business_id: location.business_id.clone(),
            rank: result.rank,
            avg_agr: result.avg_agr,
            atgr: result.atgr,
            solv: result.solv,
            timestamp,
            competitors: result.competitors.clone(),
        }
    }
}

/// Metadata about a tracking report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub keyword_id: String,
    pub term: String,
    pub business_id: String,
    pub business_name: String,
    pub center: Coordinate,
    pub grid_size: GridSize,
    pub radius: f64,
    pub unit: DistanceUnit,
    pub tracked_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// The complete report for one tracking run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingReport {
    pub metadata: ReportMetadata,
    pub result: RankingResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<crate::history::RankChange>,
    /// Earlier snapshots, oldest first.
    pub history: Vec<RankingSnapshot>,
}

/// A keyword whose tracking run failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordFailure {
    pub keyword_id: String,
    pub term: String,
    pub error: String,
}
