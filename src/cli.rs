//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{DistanceUnit, GridSize};
use clap::Parser;
use std::path::PathBuf;

/// GridRank - geo-grid local search rank tracker
///
/// Samples a business's Google local-search rank over a grid of points
/// around its location and reports average rank, top-5/top-3 coverage
/// (AGR/ATGR), share of local voice and the strongest competitors.
///
/// Examples:
///   gridrank --keyword "coffee shop" --business-id ChIJ... --lat 37.7749 --lng -122.4194
///   gridrank --keyword "dentist" --grid-size 5x5 --radius 3 --unit miles --format json
///   gridrank --keyword "plumber" --dry-run
///   gridrank --watch
///   gridrank --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Search term to track
    ///
    /// Replaces the [[keywords]] list from the config file for this run.
    #[arg(short, long, value_name = "TERM")]
    pub keyword: Option<String>,

    /// History key for --keyword (derived from term and grid when omitted)
    #[arg(long, value_name = "ID", requires = "keyword")]
    pub keyword_id: Option<String>,

    /// Place id of the business whose rank is tracked
    #[arg(short, long, value_name = "ID")]
    pub business_id: Option<String>,

    /// Display name of the business
    #[arg(long, value_name = "NAME")]
    pub business_name: Option<String>,

    /// Latitude of the grid center
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude of the grid center
    #[arg(long, allow_negative_numbers = true)]
    pub lng: Option<f64>,

    /// Grid dimensions as <rows>x<cols>
    ///
    /// Example: --grid-size 5x5
    #[arg(short, long, value_name = "RxC")]
    pub grid_size: Option<String>,

    /// Grid radius around the center
    #[arg(short, long)]
    pub radius: Option<f64>,

    /// Unit of --radius
    #[arg(short, long, value_name = "UNIT")]
    pub unit: Option<DistanceUnit>,

    /// Google Maps API key
    #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Places Nearby Search endpoint URL
    #[arg(long, env = "GRIDRANK_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Number of concurrent grid point searches
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Retries per grid point on transient failures
    #[arg(long, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Upper bound on a whole tracking run in seconds
    ///
    /// Points still unsearched when it elapses are reported as failed.
    #[arg(long, value_name = "SECS")]
    pub run_timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .gridrank.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Snapshot history file
    #[arg(long, value_name = "FILE", conflicts_with = "no_history")]
    pub history: Option<PathBuf>,

    /// Do not read or write snapshot history
    #[arg(long)]
    pub no_history: bool,

    /// Print the sampling grid without searching
    #[arg(long)]
    pub dry_run: bool,

    /// Re-run every configured keyword on its interval until Ctrl-C
    #[arg(long, conflicts_with = "dry_run")]
    pub watch: bool,

    /// Minutes between runs in --watch mode
    #[arg(long, value_name = "MINUTES")]
    pub interval: Option<u64>,

    /// Exit with code 2 if a keyword's rank dropped since the last snapshot
    #[arg(long)]
    pub fail_on_drop: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .gridrank.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref grid_size) = self.grid_size {
            grid_size
                .parse::<GridSize>()
                .map_err(|e| e.to_string())?;
        }

        if let Some(radius) = self.radius {
            if !radius.is_finite() || radius <= 0.0 {
                return Err("Radius must be greater than 0".to_string());
            }
        }

        if let Some(lat) = self.lat {
            if !(-90.0..90.0).contains(&lat) || lat == -90.0 {
                return Err("Latitude must be strictly between -90 and 90".to_string());
            }
        }

        if let Some(lng) = self.lng {
            if !(-180.0..=180.0).contains(&lng) {
                return Err("Longitude must be between -180 and 180".to_string());
            }
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) || self.run_timeout == Some(0) {
            return Err("Timeouts must be at least 1 second".to_string());
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 minute".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["gridrank"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_full_run() {
        let args = parse(&[
            "--keyword",
            "coffee shop",
            "--business-id",
            "ChIJ123",
            "--lat",
            "-33.8688",
            "--lng",
            "151.2093",
            "--grid-size",
            "5x5",
            "--radius",
            "3",
            "--unit",
            "mi",
            "--format",
            "json",
        ]);

        assert_eq!(args.keyword.as_deref(), Some("coffee shop"));
        assert_eq!(args.lat, Some(-33.8688));
        assert_eq!(args.unit, Some(DistanceUnit::Miles));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_bad_grid_size() {
        let args = parse(&["--keyword", "coffee", "--grid-size", "3by3"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_radius_and_coordinates() {
        assert!(parse(&["--radius", "0"]).validate().is_err());
        assert!(parse(&["--lat", "90"]).validate().is_err());
        assert!(parse(&["--lng", "-200"]).validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["--verbose", "--quiet"]);
        assert!(args.validate().is_err());

        assert!(Args::try_parse_from(["gridrank", "--watch", "--dry-run"]).is_err());
        assert!(Args::try_parse_from(["gridrank", "--history", "h.jsonl", "--no-history"]).is_err());
    }

    #[test]
    fn test_keyword_id_requires_keyword() {
        assert!(Args::try_parse_from(["gridrank", "--keyword-id", "kw"]).is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&[]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
