//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.gridrank.toml` files.

use crate::analysis::TrackerConfig;
use crate::models::{BusinessLocation, Coordinate, DistanceUnit, GridSize, TrackedKeyword};
use crate::search::{PlacesClientConfig, RetryPolicy};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".gridrank.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Business being tracked.
    #[serde(default)]
    pub location: LocationConfig,

    /// Keywords tracked for the location.
    #[serde(default)]
    pub keywords: Vec<KeywordConfig>,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report output path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Snapshot history file.
    #[serde(default = "default_history_file")]
    pub history_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            history_file: default_history_file(),
        }
    }
}

fn default_output() -> String {
    "gridrank_report.md".to_string()
}

fn default_history_file() -> String {
    ".gridrank/history.jsonl".to_string()
}

/// Places search provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Nearby Search endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key; usually supplied via GOOGLE_MAPS_API_KEY instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries per grid point on transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Concurrent point searches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound on a whole tracking run, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_seconds: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            concurrency: default_concurrency(),
            run_timeout_seconds: None,
        }
    }
}

fn default_endpoint() -> String {
    crate::search::places::DEFAULT_ENDPOINT.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    8
}

/// The tracked business.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Provider identifier (Google place id).
    #[serde(default)]
    pub business_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub lat: f64,

    #[serde(default)]
    pub lng: f64,
}

/// One tracked keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// History key; derived from the term and geometry when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub term: String,

    #[serde(default = "default_grid_size")]
    pub grid_size: String,

    #[serde(default = "default_radius")]
    pub radius: f64,

    #[serde(default)]
    pub unit: DistanceUnit,

    /// How often `--watch` re-runs this keyword.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_grid_size() -> String {
    "3x3".to_string()
}

fn default_radius() -> f64 {
    5.0
}

fn default_interval_minutes() -> u64 {
    24 * 60
}

impl KeywordConfig {
    /// Build a validated keyword.
    pub fn to_keyword(&self) -> Result<TrackedKeyword> {
        let grid_size: GridSize = self
            .grid_size
            .parse()
            .with_context(|| format!("Invalid grid_size for keyword '{}'", self.term))?;

        let keyword = TrackedKeyword {
            id: self.id.clone().unwrap_or_else(|| {
                TrackedKeyword::default_id(&self.term, grid_size, self.radius, self.unit)
            }),
            term: self.term.clone(),
            grid_size,
            radius: self.radius,
            unit: self.unit,
        };
        keyword
            .validate()
            .with_context(|| format!("Invalid keyword '{}'", self.term))?;
        Ok(keyword)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the competitor table.
    #[serde(default = "default_true")]
    pub include_competitors: bool,

    /// Include the history trend table.
    #[serde(default = "default_true")]
    pub include_history: bool,

    /// Most recent snapshots shown in the trend table.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_competitors: true,
            include_history: true,
            history_limit: default_history_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_limit() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; only
    /// values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref history) = args.history {
            self.general.history_file = history.display().to_string();
        }

        // Search settings
        if let Some(ref key) = args.api_key {
            self.search.api_key = Some(key.clone());
        }
        if let Some(ref endpoint) = args.endpoint {
            self.search.endpoint = endpoint.clone();
        }
        if let Some(timeout) = args.timeout {
            self.search.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.search.retries = retries;
        }
        if let Some(concurrency) = args.concurrency {
            self.search.concurrency = concurrency;
        }
        if let Some(run_timeout) = args.run_timeout {
            self.search.run_timeout_seconds = Some(run_timeout);
        }

        // Location
        if let Some(ref business_id) = args.business_id {
            self.location.business_id = business_id.clone();
        }
        if let Some(ref name) = args.business_name {
            self.location.name = Some(name.clone());
        }
        if let Some(lat) = args.lat {
            self.location.lat = lat;
        }
        if let Some(lng) = args.lng {
            self.location.lng = lng;
        }

        // An ad-hoc keyword on the command line replaces the configured list.
        if let Some(ref term) = args.keyword {
            self.keywords = vec![KeywordConfig {
                id: args.keyword_id.clone(),
                term: term.clone(),
                grid_size: args.grid_size.clone().unwrap_or_else(default_grid_size),
                radius: args.radius.unwrap_or_else(default_radius),
                unit: args.unit.unwrap_or_default(),
                interval_minutes: args.interval.unwrap_or_else(default_interval_minutes),
            }];
        } else {
            for keyword in &mut self.keywords {
                if let Some(ref grid_size) = args.grid_size {
                    keyword.grid_size = grid_size.clone();
                }
                if let Some(radius) = args.radius {
                    keyword.radius = radius;
                }
                if let Some(unit) = args.unit {
                    keyword.unit = unit;
                }
                if let Some(interval) = args.interval {
                    keyword.interval_minutes = interval;
                }
            }
        }
    }

    /// Build the validated business location.
    pub fn business_location(&self) -> Result<BusinessLocation> {
        let location = BusinessLocation {
            business_id: self.location.business_id.clone(),
            name: self.location.name.clone(),
            center: Coordinate::new(self.location.lat, self.location.lng),
        };
        location
            .validate()
            .context("Invalid business location (set [location] or --business-id/--lat/--lng)")?;
        Ok(location)
    }

    /// Build every configured keyword, failing on the first invalid one.
    pub fn tracked_keywords(&self) -> Result<Vec<TrackedKeyword>> {
        if self.keywords.is_empty() {
            bail!("No keywords to track (pass --keyword or add [[keywords]] to {})", CONFIG_FILE);
        }
        self.keywords.iter().map(KeywordConfig::to_keyword).collect()
    }

    /// Places client settings. Requires an API key.
    pub fn places_client_config(&self) -> Result<PlacesClientConfig> {
        let api_key = self
            .search
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("Missing Places API key (set GOOGLE_MAPS_API_KEY or --api-key)")?;

        Ok(PlacesClientConfig {
            endpoint: self.search.endpoint.clone(),
            api_key,
            timeout_seconds: self.search.timeout_seconds,
        })
    }

    pub fn tracker_config(&self, show_progress: bool) -> TrackerConfig {
        TrackerConfig {
            concurrency: self.search.concurrency.max(1),
            retry: RetryPolicy {
                max_retries: self.search.retries,
                base_delay: Duration::from_millis(self.search.backoff_ms),
            },
            run_timeout: self.search.run_timeout_seconds.map(Duration::from_secs),
            show_progress,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config {
            location: LocationConfig {
                business_id: "ChIJ-your-place-id".to_string(),
                name: Some("Your Business".to_string()),
                lat: 37.7749,
                lng: -122.4194,
            },
            keywords: vec![KeywordConfig {
                id: None,
                term: "coffee shop".to_string(),
                grid_size: default_grid_size(),
                radius: default_radius(),
                unit: DistanceUnit::Kilometers,
                interval_minutes: default_interval_minutes(),
            }],
            ..Config::default()
        };
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.retries, 3);
        assert_eq!(config.search.concurrency, 8);
        assert!(config.keywords.is_empty());
        assert!(config.report.include_competitors);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
verbose = true

[search]
api_key = "abc"
retries = 5
concurrency = 4

[location]
business_id = "ChIJ123"
name = "Corner Cafe"
lat = 37.7749
lng = -122.4194

[[keywords]]
term = "coffee"
grid_size = "5x5"
radius = 3
unit = "miles"

[[keywords]]
id = "espresso-bar"
term = "espresso bar"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert_eq!(config.search.retries, 5);
        assert_eq!(config.search.api_key.as_deref(), Some("abc"));

        let keywords = config.tracked_keywords().unwrap();
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].grid_size, GridSize { rows: 5, cols: 5 });
        assert_eq!(keywords[0].unit, DistanceUnit::Miles);
        assert_eq!(keywords[0].id, "coffee-5x5-3mi");
        assert_eq!(keywords[1].id, "espresso-bar");
        assert_eq!(keywords[1].radius, 5.0);

        let location = config.business_location().unwrap();
        assert_eq!(location.business_id, "ChIJ123");
        assert_eq!(location.display_name(), "Corner Cafe");
    }

    #[test]
    fn test_invalid_keyword_rejected() {
        let config: Config = toml::from_str(
            r#"
[[keywords]]
term = "coffee"
grid_size = "3by3"
"#,
        )
        .unwrap();
        assert!(config.tracked_keywords().is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let config = Config::default();
        assert!(config.places_client_config().is_err());
    }

    #[test]
    fn test_cli_keyword_overrides_file() {
        let mut config: Config = toml::from_str(
            r#"
[[keywords]]
term = "tea"
"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "gridrank",
            "--keyword",
            "coffee",
            "--grid-size",
            "7x7",
            "--radius",
            "2",
            "--business-id",
            "place-1",
            "--lat",
            "40.0",
            "--lng",
            "-74.0",
            "--concurrency",
            "2",
        ])
        .unwrap();
        config.merge_with_args(&args);

        let keywords = config.tracked_keywords().unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].term, "coffee");
        assert_eq!(keywords[0].grid_size.point_count(), 49);
        assert_eq!(config.search.concurrency, 2);
        assert_eq!(config.business_location().unwrap().center.lat, 40.0);
    }

    #[test]
    fn test_logging_is_cli_only() {
        // Verbosity comes from -v/-q; a leftover key in the file is ignored.
        let config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(config.general.output, default_output());
        assert!(!Config::default_toml().contains("verbose"));
    }

    #[test]
    fn test_tracker_config() {
        let mut config = Config::default();
        config.search.run_timeout_seconds = Some(60);
        config.search.concurrency = 0;

        let tracker = config.tracker_config(false);
        assert_eq!(tracker.concurrency, 1);
        assert_eq!(tracker.run_timeout, Some(Duration::from_secs(60)));
        assert_eq!(tracker.retry.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[location]"));
        assert!(toml_str.contains("[[keywords]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.tracked_keywords().unwrap().len(), 1);
    }
}
