// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data types shared by the resolver, navigator, loader and orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a job should scrape. Immutable once the job is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TargetSpec {
    Url(String),
    Search(String),
}

impl TargetSpec {
    /// Classify free-form input: anything that looks like a link is a URL,
    /// everything else is a search query.
    pub fn classify(input: &str) -> Self {
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        let bare = lower.strip_prefix("www.").unwrap_or(&lower);
        if lower.starts_with("http://")
            || lower.starts_with("https://")
            || lower.starts_with("www.google.")
            || bare.starts_with("maps.app.goo.gl")
            || bare.starts_with("goo.gl/maps")
            || bare.starts_with("maps.google.")
            || (bare.starts_with("google.") && bare.contains("/maps"))
        {
            TargetSpec::Url(trimmed.to_string())
        } else {
            TargetSpec::Search(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetSpec::Url(s) | TargetSpec::Search(s) => s,
        }
    }
}

/// Latitude/longitude pair lifted from a place URL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Output of the resolver. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    /// URL the navigator loads.
    pub canonical_url: String,
    /// Decimal CID when the input carried an encoded identifier block.
    pub cid: Option<u64>,
    /// The raw `<hex>:<hex>` feature identifier, kept opaque.
    pub feature_id: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// True when `canonical_url` is a search page rather than a place page.
    pub is_search: bool,
}

impl ResolvedPlace {
    /// Identifier stamped onto every review scraped from this place.
    pub fn source_ref(&self) -> String {
        match self.cid {
            Some(cid) => cid.to_string(),
            None => self.canonical_url.clone(),
        }
    }
}

/// Which layout Google served for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageMode {
    ReviewCapable,
    ReviewAbsent,
    Unknown,
}

impl std::fmt::Display for PageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReviewCapable => write!(f, "review-capable"),
            Self::ReviewAbsent => write!(f, "review-absent"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Header information read off a place page. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub name: Option<String>,
    pub average_rating: Option<String>,
    pub review_count: Option<u64>,
}

/// One scraped review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Site-assigned review id (`data-review-id`).
    pub review_id: String,
    pub author: Option<String>,
    /// 1..=5, `None` when the node carried no readable rating.
    pub rating: Option<u8>,
    /// Relative or absolute post date exactly as displayed.
    pub date_text: Option<String>,
    /// Full text after expansion and clean-up. May be empty.
    pub text: String,
    /// CID (decimal) or canonical URL of the place.
    pub place_ref: String,
}

impl ReviewRecord {
    /// `★★★☆☆` style rendering, or `評価なし` for unrated reviews.
    pub fn stars(&self) -> String {
        match self.rating {
            Some(r) if (1..=5).contains(&r) => {
                let filled = usize::from(r);
                format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
            }
            _ => "評価なし".to_string(),
        }
    }
}

/// How the loader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStop {
    TargetReached,
    /// Consecutive attempts produced no new nodes.
    Exhausted,
    /// The attempt ceiling was hit while nodes were still arriving.
    CeilingReached,
    /// No scrollable review list was found.
    NoContainer,
}

/// Lifecycle of a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed { reason: String, detail: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed { .. })
    }
}

/// Everything a succeeded job produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub place: ResolvedPlace,
    pub mode: PageMode,
    pub summary: PlaceSummary,
    pub reviews: Vec<ReviewRecord>,
    pub requested: usize,
    pub obtained: usize,
    pub load_stop: Option<LoadStop>,
    /// Review nodes dropped by the parser.
    pub skipped_nodes: usize,
    /// Set for explained empty results such as `no-reviews`.
    pub note: Option<String>,
}

impl JobResult {
    pub fn is_short(&self) -> bool {
        self.obtained < self.requested
    }
}

/// One target plus its desired review count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub target: TargetSpec,
    pub target_count: usize,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    /// Caller-supplied columns carried through untouched (batch CSV rows).
    pub tags: Vec<(String, String)>,
}

impl ScrapeJob {
    pub fn new(target: TargetSpec, target_count: usize) -> Self {
        Self {
            target,
            target_count,
            status: JobStatus::Pending,
            result: None,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<(String, String)>) -> Self {
        self.tags = tags;
        self
    }

    /// Mark the job failed with a machine reason and a human detail.
    pub fn fail(&mut self, reason: &str, detail: impl Into<String>) {
        self.status = JobStatus::Failed {
            reason: reason.to_string(),
            detail: detail.into(),
        };
    }
}

/// Counts derived from the jobs of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reviews: usize,
}

/// An ordered sequence of jobs run on one browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub jobs: Vec<ScrapeJob>,
}

impl BatchJob {
    pub fn new(jobs: Vec<ScrapeJob>) -> Self {
        Self {
            id: Uuid::new_v4(),
            jobs,
        }
    }

    pub fn summary(&self) -> BatchSummary {
        let mut s = BatchSummary {
            total: self.jobs.len(),
            ..BatchSummary::default()
        };
        for job in &self.jobs {
            match job.status {
                JobStatus::Pending => s.pending += 1,
                JobStatus::Running => s.running += 1,
                JobStatus::Succeeded => s.succeeded += 1,
                JobStatus::Failed { .. } => s.failed += 1,
            }
            if let Some(ref r) = job.result {
                s.reviews += r.reviews.len();
            }
        }
        s
    }

    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|j| j.status.is_terminal())
    }
}
