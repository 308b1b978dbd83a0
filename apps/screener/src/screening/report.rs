//! Ranking, run summary, and the per-run CSV report.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::models::analysis::{RecordStatus, ResultRecord};

/// Scores at or above this are recommended for interview.
pub const HIGH_SCORE: u8 = 70;
pub const MEDIUM_SCORE: u8 = 50;
const TOP_PREVIEW: usize = 10;

/// Successes ranked by score (descending, stable), failures in processing order.
#[derive(Debug, Default)]
pub struct RankedResults {
    pub successes: Vec<ResultRecord>,
    pub failures: Vec<ResultRecord>,
}

impl RankedResults {
    pub fn rank(records: Vec<ResultRecord>) -> Self {
        let (mut successes, failures): (Vec<_>, Vec<_>) =
            records.into_iter().partition(ResultRecord::is_success);
        successes.sort_by(|a, b| b.score.cmp(&a.score));
        Self {
            successes,
            failures,
        }
    }

    /// Report order: ranked successes, then failures.
    pub fn ordered(&self) -> impl Iterator<Item = &ResultRecord> {
        self.successes.iter().chain(self.failures.iter())
    }

    fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub average_score: Option<f64>,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl RunSummary {
    pub fn from_ranked(ranked: &RankedResults) -> Self {
        let scores: Vec<u8> = ranked.successes.iter().map(|r| r.score).collect();
        let average_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64)
        };

        Self {
            total: ranked.len(),
            succeeded: ranked.successes.len(),
            failed: ranked.failures.len(),
            average_score,
            high: scores.iter().filter(|&&s| s >= HIGH_SCORE).count(),
            medium: scores
                .iter()
                .filter(|&&s| (MEDIUM_SCORE..HIGH_SCORE).contains(&s))
                .count(),
            low: scores.iter().filter(|&&s| s < MEDIUM_SCORE).count(),
        }
    }
}

/// Prints the human-readable run summary to stdout.
pub fn print_summary(ranked: &RankedResults, summary: &RunSummary) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("DETAILED RESULTS SUMMARY");
    println!("{rule}");
    println!("Total files processed: {}", summary.total);
    println!("Successfully analyzed: {}", summary.succeeded);
    println!("Failed to process: {}", summary.failed);

    if let Some(average) = summary.average_score {
        println!("Average score: {average:.1}%");
        println!("High scores ({HIGH_SCORE}+): {}", summary.high);
        println!(
            "Medium scores ({MEDIUM_SCORE}-{}): {}",
            HIGH_SCORE - 1,
            summary.medium
        );
        println!("Low scores (<{MEDIUM_SCORE}): {}", summary.low);

        println!("\nTOP {TOP_PREVIEW} CANDIDATES:");
        for (i, record) in ranked.successes.iter().take(TOP_PREVIEW).enumerate() {
            println!(
                "{:2}. {:<30} | {:3}% | {}",
                i + 1,
                record.filename,
                record.score,
                truncate_chars(&record.tags, 50)
            );
            println!("    Summary: {}", truncate_chars(&record.summary, 100));
            println!();
        }
    }

    if !ranked.failures.is_empty() {
        println!("\nFAILED FILES:");
        for record in &ranked.failures {
            println!(
                "   {:<30} | {}",
                record.filename,
                truncate_chars(&record.summary, 80)
            );
        }
    }
}

/// Best candidate, score range and interview count, after the run completes.
pub fn print_insights(ranked: &RankedResults, summary: &RunSummary) {
    let (Some(best), Some(worst)) = (ranked.successes.first(), ranked.successes.last()) else {
        return;
    };
    println!("\nINSIGHTS:");
    println!("   - Best candidate: {} ({}%)", best.filename, best.score);
    if ranked.successes.len() > 1 {
        println!("   - Score range: {}% - {}%", worst.score, best.score);
    }
    println!(
        "   - Recommended for interview: {} candidates",
        summary.high
    );
}

#[derive(Serialize)]
struct ReportRow<'a> {
    filename: &'a str,
    score: u8,
    summary: &'a str,
    tags: &'a str,
    status: RecordStatus,
}

pub fn report_file_name(generated_at: DateTime<Local>) -> String {
    format!("results_{}.csv", generated_at.format("%Y%m%d_%H%M%S"))
}

/// Writes `results_<timestamp>.csv` into `dir` and returns its path.
pub fn write_report(
    dir: &Path,
    ranked: &RankedResults,
    generated_at: DateTime<Local>,
) -> Result<PathBuf> {
    let path = dir.join(report_file_name(generated_at));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    write_csv(file, ranked).with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

fn write_csv<W: Write>(writer: W, ranked: &RankedResults) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in ranked.ordered() {
        csv.serialize(ReportRow {
            filename: &record.filename,
            score: record.score,
            summary: &record.summary,
            tags: &record.tags,
            status: record.status,
        })?;
    }
    csv.flush()?;
    Ok(())
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}...")
}
