//! GridRank - geo-grid local search rank tracker
//!
//! A CLI tool that samples a business's Google local-search rank over a
//! grid of points, aggregates the results into visibility metrics, keeps
//! a snapshot history, and writes Markdown/JSON reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, provider, history, etc.)
//!   2 - A keyword's rank dropped and --fail-on-drop was set

mod analysis;
mod cli;
mod config;
mod error;
mod grid;
mod history;
mod models;
mod report;
mod scheduler;
mod search;

use analysis::RankTracker;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use history::{SharedStore, SnapshotStore};
use models::{
    BusinessLocation, KeywordFailure, RankingSnapshot, ReportMetadata, TrackedKeyword,
    TrackingReport,
};
use scheduler::Scheduler;
use search::{GooglePlacesClient, PlacesSearch};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("GridRank v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Tracking failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .gridrank.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Set [location] and [[keywords]], then export GOOGLE_MAPS_API_KEY.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the requested workflow. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let location = config.business_location()?;

    if args.dry_run {
        return handle_dry_run(&config, &location);
    }

    let client = GooglePlacesClient::new(config.places_client_config()?)
        .context("Failed to initialize Places client")?;
    let provider: Arc<dyn PlacesSearch> = Arc::new(client);

    let show_progress = !args.quiet && !args.watch;
    let tracker = RankTracker::new(provider, config.tracker_config(show_progress));

    let store = if args.no_history {
        None
    } else {
        Some(SharedStore::new(SnapshotStore::new(&config.general.history_file)))
    };

    if args.watch {
        return run_watch(&config, tracker, location, store).await;
    }

    let keywords = config.tracked_keywords()?;

    println!("📍 Tracking {} for {}", keywords.len(), location.display_name());
    println!("   Center: {}", location.center);
    println!("   Concurrency: {}", config.search.concurrency);

    let tracking = track_all(&tracker, &keywords, &location, store.as_ref()).await;

    let output = render_reports(&tracking, args.format, &config)?;
    let output_path = &config.general.output;
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path))?;

    if tracking.failures.is_empty() {
        println!("\n✅ Tracking complete! Report saved to: {}", output_path);
    } else {
        println!("\n⚠️  Tracking finished with errors. Report saved to: {}", output_path);
        eprintln!(
            "\n❌ {} of {} keyword(s) failed: {}",
            tracking.failures.len(),
            keywords.len(),
            tracking
                .failures
                .iter()
                .map(|f| f.term.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let dropped = tracking.dropped_terms();
    if args.fail_on_drop && !dropped.is_empty() {
        eprintln!("\n⛔ Rank dropped for: {}.", dropped.join(", "));
    }

    Ok(tracking.exit_code(args.fail_on_drop))
}

/// Reports and failures from one pass over the keywords.
#[derive(Debug, Default)]
struct TrackingRun {
    reports: Vec<TrackingReport>,
    failures: Vec<KeywordFailure>,
}

impl TrackingRun {
    fn dropped_terms(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.change.map(|c| c.is_drop()).unwrap_or(false))
            .map(|r| r.metadata.term.as_str())
            .collect()
    }

    /// 1 if any keyword failed, else 2 on a rank drop with --fail-on-drop, else 0.
    fn exit_code(&self, fail_on_drop: bool) -> i32 {
        if !self.failures.is_empty() {
            1
        } else if fail_on_drop && !self.dropped_terms().is_empty() {
            2
        } else {
            0
        }
    }
}

/// Track every keyword in turn. A failed keyword is logged and recorded,
/// and the remaining keywords still run.
async fn track_all(
    tracker: &RankTracker,
    keywords: &[TrackedKeyword],
    location: &BusinessLocation,
    store: Option<&SharedStore>,
) -> TrackingRun {
    let mut tracking = TrackingRun::default();

    for keyword in keywords {
        println!(
            "\n🔎 '{}' on a {} grid ({} {})...",
            keyword.term,
            keyword.grid_size,
            keyword.radius,
            keyword.unit.abbreviation()
        );

        match run_keyword(tracker, keyword, location, store).await {
            Ok(report) => {
                print_summary(&report);
                tracking.reports.push(report);
            }
            Err(e) => {
                error!("Keyword '{}' failed: {:#}", keyword.term, e);
                println!("   ❌ Failed: {:#}", e);
                tracking.failures.push(KeywordFailure {
                    keyword_id: keyword.id.clone(),
                    term: keyword.term.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    tracking
}

/// Track one keyword, persist the snapshot, and build its report.
async fn run_keyword(
    tracker: &RankTracker,
    keyword: &TrackedKeyword,
    location: &BusinessLocation,
    store: Option<&SharedStore>,
) -> Result<TrackingReport> {
    let start_time = Instant::now();
    let tracked_at = Utc::now();

    let result = tracker
        .track_keyword(keyword, location)
        .await
        .with_context(|| format!("Failed to track '{}'", keyword.term))?;

    let mut change = None;
    let mut history = Vec::new();

    if let Some(store) = store {
        let snapshot = RankingSnapshot::from_result(keyword, location, &result, tracked_at);
        let recorded = store
            .record(snapshot)
            .await
            .with_context(|| format!("Failed to record history in {}", store.path().display()))?;

        if recorded.change.is_alert() {
            warn!(
                "Rank change for '{}' ({}): {}",
                keyword.term, location.business_id, recorded.change
            );
        }

        change = Some(recorded.change);
        history = recorded.history;
    }

    let metadata = ReportMetadata {
        keyword_id: keyword.id.clone(),
        term: keyword.term.clone(),
        business_id: location.business_id.clone(),
        business_name: location.display_name().to_string(),
        center: location.center,
        grid_size: keyword.grid_size,
        radius: keyword.radius,
        unit: keyword.unit,
        tracked_at,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    Ok(TrackingReport {
        metadata,
        result,
        change,
        history,
    })
}

/// Handle --watch: schedule every keyword until Ctrl-C.
async fn run_watch(
    config: &Config,
    tracker: RankTracker,
    location: BusinessLocation,
    store: Option<SharedStore>,
) -> Result<i32> {
    let mut scheduler = Scheduler::new();

    for keyword_config in &config.keywords {
        let keyword = keyword_config.to_keyword()?;
        let interval = keyword_config.interval();
        let id = keyword.id.clone();

        if scheduler.is_scheduled(&id) {
            warn!("Keyword id '{}' is configured twice; keeping the last entry", id);
        }

        let tracker = tracker.clone();
        let location = location.clone();
        let store = store.clone();

        scheduler.schedule(&id, interval, move || {
            let tracker = tracker.clone();
            let keyword = keyword.clone();
            let location = location.clone();
            let store = store.clone();
            async move {
                match run_keyword(&tracker, &keyword, &location, store.as_ref()).await {
                    Ok(report) => info!(
                        "'{}': rank {} | AGR {:.1}% | ATGR {:.1}% | SoLV {:.2}%",
                        keyword.term,
                        report.result.rank,
                        report.result.avg_agr,
                        report.result.atgr,
                        report.result.solv
                    ),
                    Err(e) => error!("Scheduled run for '{}' failed: {:#}", keyword.term, e),
                }
            }
        });
    }

    if scheduler.is_empty() {
        anyhow::bail!("No keywords to watch (add [[keywords]] to {} or pass --keyword)", CONFIG_FILE);
    }

    println!(
        "⏱️  Watching {} keyword(s) for {}. Press Ctrl-C to stop.",
        scheduler.len(),
        location.display_name()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!("\n🛑 Stopping scheduled runs...");
    scheduler.shutdown();
    Ok(0)
}

/// Handle --dry-run: print the sampling grid, exit.
fn handle_dry_run(config: &Config, location: &BusinessLocation) -> Result<i32> {
    println!("\n🔍 Dry run: generating grids (no searches)...\n");

    for keyword in config.tracked_keywords()? {
        let sampler = grid::GridSampler::new(location.center, keyword.radius_km(), keyword.grid_size);
        let span = sampler.span();
        let points = sampler.points();

        println!(
            "   '{}' ({}): {} points, ±{:.5}° lat / ±{:.5}° lng, search radius {}m",
            keyword.term,
            keyword.grid_size,
            points.len(),
            span.lat,
            span.lng,
            keyword.search_radius_meters()
        );
        for point in &points {
            println!("     📌 [{},{}] {}", point.row, point.col, point.coordinate);
        }
        println!();
    }

    println!("✅ Dry run complete. No searches were made.");
    Ok(0)
}

fn print_summary(report: &TrackingReport) {
    let result = &report.result;

    if result.is_no_data() {
        println!("   Not found in any searched grid point.");
    } else {
        println!(
            "   Rank: #{} | AGR: {:.1}% | ATGR: {:.1}% | SoLV: {:.2}%",
            result.rank, result.avg_agr, result.atgr, result.solv
        );
    }
    println!(
        "   Points: {}/{} searched, {} failed",
        result.coverage.points_searched, result.coverage.points_total, result.coverage.points_failed
    );
    if let Some(change) = report.change {
        println!("   Change: {}", change);
    }
    if let Some(top) = result.competitors.first() {
        println!("   Top competitor: {} (#{})", top.name, top.rank);
    }
}

/// Render every report in the requested format.
///
/// Markdown output ends with a section naming the failed keywords; JSON
/// output carries the successful reports only.
fn render_reports(tracking: &TrackingRun, format: OutputFormat, config: &Config) -> Result<String> {
    match format {
        OutputFormat::Markdown => {
            let mut output = tracking
                .reports
                .iter()
                .map(|r| report::generate_markdown_report(r, &config.report))
                .collect::<Vec<_>>()
                .join("\n");
            output.push_str(&report::generate_failures_section(&tracking.failures));
            Ok(output)
        }
        OutputFormat::Json => match tracking.reports.as_slice() {
            [single] => report::generate_json_report(single),
            many => serde_json::to_string_pretty(many).map_err(Into::into),
        },
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
