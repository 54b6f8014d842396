// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Writing batch results as CSV or a JSON report.

use chrono::{DateTime, Local};
use mapreviews::{BatchJob, BatchSummary, JobStatus, LoadStop, PlaceSummary, ReviewRecord};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const CSV_HEADER: &[&str] = &[
    "review_id",
    "author",
    "rating",
    "stars",
    "date",
    "text",
    "place_id",
    "place_name",
    "source_url",
];

#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// `google_maps_reviews_<YYYYmmdd_HHMMSS>.<ext>`
pub fn default_path(format: OutputFormat, now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "google_maps_reviews_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

pub fn write(batch: &BatchJob, format: OutputFormat, path: &Path) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::create(path).map_err(io_err)?;
    let mut out = std::io::BufWriter::new(file);
    match format {
        OutputFormat::Csv => write_csv(batch, &mut out)?,
        OutputFormat::Json => write_json(batch, &mut out)?,
    }
    out.flush().map_err(io_err)?;
    Ok(())
}

/// Tag columns across all jobs, in order of first appearance.
fn tag_columns(batch: &BatchJob) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for job in &batch.jobs {
        for (key, _) in &job.tags {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// One row per review, preceded by a BOM so spreadsheets pick UTF-8.
pub fn write_csv<W: Write>(batch: &BatchJob, out: &mut W) -> Result<(), OutputError> {
    out.write_all(UTF8_BOM).map_err(|source| OutputError::Io {
        path: "<csv>".to_string(),
        source,
    })?;

    let tags = tag_columns(batch);
    let mut writer = csv::Writer::from_writer(out);

    let mut header: Vec<&str> = CSV_HEADER.to_vec();
    header.extend(tags.iter().map(String::as_str));
    writer.write_record(&header)?;

    for job in &batch.jobs {
        let Some(ref result) = job.result else {
            continue;
        };
        let place_name = result.summary.name.as_deref().unwrap_or("");
        let tag_values: Vec<&str> = tags
            .iter()
            .map(|col| {
                job.tags
                    .iter()
                    .find(|(k, _)| k == col)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("")
            })
            .collect();

        for review in &result.reviews {
            let rating = review.rating.map(|r| r.to_string()).unwrap_or_default();
            let stars = review.stars();
            let mut row: Vec<&str> = vec![
                review.review_id.as_str(),
                review.author.as_deref().unwrap_or(""),
                rating.as_str(),
                stars.as_str(),
                review.date_text.as_deref().unwrap_or(""),
                review.text.as_str(),
                review.place_ref.as_str(),
                place_name,
                job.target.as_str(),
            ];
            row.extend(tag_values.iter().copied());
            writer.write_record(&row)?;
        }
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: "<csv>".to_string(),
        source,
    })?;
    Ok(())
}

#[derive(Serialize)]
struct Report<'a> {
    batch_id: String,
    summary: BatchSummary,
    jobs: Vec<JobReport<'a>>,
}

#[derive(Serialize)]
struct JobReport<'a> {
    target: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    requested: usize,
    obtained: usize,
    short: bool,
    skipped_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_stop: Option<LoadStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    place: Option<&'a PlaceSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<(&'a str, &'a str)>,
    reviews: &'a [ReviewRecord],
}

pub fn write_json<W: Write>(batch: &BatchJob, out: &mut W) -> Result<(), OutputError> {
    let jobs = batch
        .jobs
        .iter()
        .map(|job| {
            let (status, reason, detail) = match job.status {
                JobStatus::Pending => ("pending", None, None),
                JobStatus::Running => ("running", None, None),
                JobStatus::Succeeded => ("succeeded", None, None),
                JobStatus::Failed {
                    ref reason,
                    ref detail,
                } => ("failed", Some(reason.as_str()), Some(detail.as_str())),
            };
            let result = job.result.as_ref();
            JobReport {
                target: job.target.as_str(),
                status,
                reason,
                detail,
                requested: job.target_count,
                obtained: result.map_or(0, |r| r.obtained),
                short: result.is_some_and(|r| r.is_short()),
                skipped_nodes: result.map_or(0, |r| r.skipped_nodes),
                load_stop: result.and_then(|r| r.load_stop),
                note: result.and_then(|r| r.note.as_deref()),
                place: result.map(|r| &r.summary),
                tags: job
                    .tags
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect(),
                reviews: result.map(|r| r.reviews.as_slice()).unwrap_or_default(),
            }
        })
        .collect();

    let report = Report {
        batch_id: batch.id.to_string(),
        summary: batch.summary(),
        jobs,
    };
    serde_json::to_writer_pretty(out, &report)?;
    Ok(())
}

/// One line per job for stderr.
pub fn summary_lines(batch: &BatchJob) -> Vec<String> {
    batch
        .jobs
        .iter()
        .enumerate()
        .map(|(i, job)| {
            let n = i + 1;
            let target = job.target.as_str();
            match (&job.status, &job.result) {
                (JobStatus::Succeeded, Some(r)) => {
                    let mut line = format!("[{n}] {target}: {}/{} reviews", r.obtained, r.requested);
                    if let Some(ref note) = r.note {
                        line.push_str(&format!(" ({note})"));
                    } else if r.is_short() {
                        line.push_str(" (short)");
                    }
                    line
                }
                (JobStatus::Failed { reason, detail }, _) => {
                    format!("[{n}] {target}: FAILED {reason}: {detail}")
                }
                (status, _) => format!("[{n}] {target}: {status:?}"),
            }
        })
        .collect()
}
