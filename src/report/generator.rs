//! Markdown and JSON report generation.
//!
//! This module renders one tracking run, with its rank change and recent
//! history, as a Markdown document or pretty JSON.

use crate::config::ReportConfig;
use crate::history::RankChange;
use crate::models::{
    CompetitorRanking, Coverage, KeywordFailure, RankingResult, RankingSnapshot, ReportMetadata,
    TrackingReport,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &TrackingReport, config: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# GridRank Report: {}\n\n", report.metadata.term));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_metrics_section(&report.result, report.change.as_ref()));
    output.push_str(&generate_coverage_section(&report.result.coverage));

    if config.include_competitors {
        output.push_str(&generate_competitors_section(&report.result.competitors));
    }

    if config.include_history {
        output.push_str(&generate_history_section(&report.history, config.history_limit));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Business:** {} (`{}`)\n",
        metadata.business_name, metadata.business_id
    ));
    section.push_str(&format!("- **Keyword:** {} (`{}`)\n", metadata.term, metadata.keyword_id));
    section.push_str(&format!("- **Center:** {}\n", metadata.center));
    section.push_str(&format!(
        "- **Grid:** {} over {} {}\n",
        metadata.grid_size,
        metadata.radius,
        metadata.unit.abbreviation()
    ));
    section.push_str(&format!(
        "- **Tracked At:** {}\n",
        metadata.tracked_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Duration:** {:.1}s\n", metadata.duration_seconds));
    section.push('\n');

    section
}

/// Generate the metrics table.
fn generate_metrics_section(result: &RankingResult, change: Option<&RankChange>) -> String {
    let mut section = String::new();

    section.push_str("## Visibility\n\n");

    if result.is_no_data() {
        section.push_str(
            "> The business did not appear in any searched grid point. All metrics are 0.\n\n",
        );
    }

    section.push_str("| Rank | AGR (top 5) | ATGR (top 3) | SoLV |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {:.1}% | {:.1}% | {:.2}% |\n\n",
        format_rank(result.rank),
        result.avg_agr,
        result.atgr,
        result.solv
    ));

    if let Some(change) = change {
        let marker = match change {
            RankChange::Improved { .. } => "📈",
            RankChange::Dropped { .. } => "📉",
            RankChange::Unchanged { .. } | RankChange::NoBaseline => "➖",
        };
        section.push_str(&format!("**Change since last run:** {} {}\n\n", marker, change));
    }

    section
}

/// Generate the grid coverage section.
fn generate_coverage_section(coverage: &Coverage) -> String {
    let mut section = String::new();

    section.push_str("## Coverage\n\n");
    section.push_str(&format!(
        "- **Points searched:** {}/{}\n",
        coverage.points_searched, coverage.points_total
    ));
    if coverage.points_failed > 0 {
        section.push_str(&format!(
            "- **Points failed:** {} (excluded from metrics)\n",
            coverage.points_failed
        ));
    }
    section.push_str(&format!(
        "- **Target appearances:** {}\n",
        coverage.target_appearances
    ));
    section.push_str(&format!(
        "- **Total observations:** {}\n\n",
        coverage.total_observations
    ));

    section
}

/// Generate the competitor table.
fn generate_competitors_section(competitors: &[CompetitorRanking]) -> String {
    let mut section = String::new();

    section.push_str("## Top Competitors\n\n");

    if competitors.is_empty() {
        section.push_str("No competitors were observed.\n\n");
        return section;
    }

    section.push_str("| # | Business | Rank | Appearances |\n");
    section.push_str("|:---:|:---|:---:|:---:|\n");
    for (i, competitor) in competitors.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            escape_cell(&competitor.name),
            competitor.rank,
            competitor.appearances
        ));
    }
    section.push('\n');

    section
}

/// Generate the history trend table, newest last.
fn generate_history_section(history: &[RankingSnapshot], limit: usize) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## History\n\n");
    section.push_str("| Date | Rank | AGR | ATGR | SoLV |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");

    let skip = history.len().saturating_sub(limit);
    for snapshot in history.iter().skip(skip) {
        section.push_str(&format!(
            "| {} | {} | {:.1}% | {:.1}% | {:.2}% |\n",
            snapshot.timestamp.format("%Y-%m-%d %H:%M"),
            format_rank(snapshot.rank),
            snapshot.avg_agr,
            snapshot.atgr,
            snapshot.solv
        ));
    }
    section.push('\n');

    section
}

/// Generate the section listing keywords that could not be tracked.
pub fn generate_failures_section(failures: &[KeywordFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failed Keywords\n\n");
    for failure in failures {
        section.push_str(&format!(
            "- ❌ **{}** (`{}`): {}\n",
            failure.term,
            failure.keyword_id,
            failure.error.replace('\n', " ")
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by GridRank*\n".to_string()
}

fn format_rank(rank: u32) -> String {
    if rank == 0 {
        "–".to_string()
    } else {
        format!("#{}", rank)
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &TrackingReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
