// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequential batch execution.
//!
//! The orchestrator owns the renderer and runs the jobs of a batch one after
//! another on a single browser session: resolve, navigate (with bounded
//! retries on a missing reviews tab), load, parse, deduplicate. A job that
//! fails is marked `failed(reason)` and the batch moves on. Every navigation
//! passes through the rate limiter.

use crate::cancel::CancelToken;
use crate::collector::ReviewSet;
use crate::config::ScrapeConfig;
use crate::error::{NavigationError, ScrapeError};
use crate::loader;
use crate::navigator::{self, NavigationOutcome};
use crate::parser;
use crate::progress::{ProgressEmitter, ProgressEventKind, ProgressSender};
use crate::rate_limit::RateLimiter;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use crate::resolver;
use crate::session::BrowserSession;
use crate::types::{BatchJob, BatchSummary, JobResult, JobStatus, PageMode, ResolvedPlace, ScrapeJob};
use std::sync::Arc;

pub const NOTE_NO_REVIEWS: &str = "no-reviews";

pub struct Orchestrator {
    renderer: Arc<dyn Renderer>,
    config: ScrapeConfig,
    progress: Option<ProgressSender>,
}

impl Orchestrator {
    pub fn new(renderer: Arc<dyn Renderer>, config: ScrapeConfig) -> Self {
        Self {
            renderer,
            config,
            progress: None,
        }
    }

    /// Launch Chromium per `config.browser` and wrap it.
    pub async fn launch(config: ScrapeConfig) -> anyhow::Result<Self> {
        let renderer = ChromiumRenderer::new(&config.browser).await?;
        Ok(Self::new(Arc::new(renderer), config))
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Shut the browser down.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.renderer.shutdown().await
    }

    /// Run every non-terminal job of `batch` in order, updating each in place.
    ///
    /// Jobs that are already terminal when the batch starts (for example rows
    /// rejected while reading input) are left untouched.
    pub async fn run_batch(&self, batch: &mut BatchJob, cancel: &CancelToken) -> BatchSummary {
        let mut emitter = ProgressEmitter::new(self.progress.clone(), batch.id);
        let total = batch.jobs.len();
        tracing::info!(batch = %batch.id, jobs = total, "batch started");

        let mut session = match BrowserSession::acquire(
            self.renderer.as_ref(),
            &self.config.browser,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                let detail = format!("{e:#}");
                tracing::error!("browser session unavailable: {detail}");
                emitter.emit(ProgressEventKind::Warning {
                    message: format!("browser session unavailable: {detail}"),
                });
                for job in batch.jobs.iter_mut().filter(|j| !j.status.is_terminal()) {
                    job.fail("browser", detail.clone());
                }
                return self.finish(batch, &mut emitter);
            }
        };

        let mut limiter = RateLimiter::new(self.config.batch.min_delay());

        for (index, job) in batch.jobs.iter_mut().enumerate() {
            if job.status.is_terminal() {
                continue;
            }
            if cancel.is_cancelled() {
                job.fail("cancelled", "batch cancelled before the job started");
                continue;
            }

            job.status = JobStatus::Running;
            emitter.emit(ProgressEventKind::JobStarted {
                job: index,
                total,
                target: job.target.as_str().to_string(),
                requested: job.target_count,
            });

            let run = JobRun {
                index,
                config: &self.config,
                cancel,
            };
            match run
                .execute(job, &mut session, &mut limiter, &mut emitter)
                .await
            {
                Ok(result) => {
                    if result.is_short() {
                        tracing::info!(
                            job = index,
                            requested = result.requested,
                            obtained = result.obtained,
                            "fewer reviews than requested"
                        );
                    }
                    emitter.emit(ProgressEventKind::JobFinished {
                        job: index,
                        obtained: result.obtained,
                        requested: result.requested,
                        failure: None,
                    });
                    job.status = JobStatus::Succeeded;
                    job.result = Some(result);
                }
                Err(e) => {
                    tracing::warn!(job = index, reason = e.reason(), "job failed: {e}");
                    emitter.emit(ProgressEventKind::JobFinished {
                        job: index,
                        obtained: 0,
                        requested: job.target_count,
                        failure: Some(e.reason().to_string()),
                    });
                    job.fail(e.reason(), e.to_string());
                }
            }
        }

        session.release().await;
        self.finish(batch, &mut emitter)
    }

    /// Convenience wrapper for a single job.
    pub async fn run_one(&self, job: ScrapeJob, cancel: &CancelToken) -> ScrapeJob {
        let mut batch = BatchJob::new(vec![job]);
        self.run_batch(&mut batch, cancel).await;
        batch.jobs.remove(0)
    }

    fn finish(&self, batch: &BatchJob, emitter: &mut ProgressEmitter) -> BatchSummary {
        let summary = batch.summary();
        tracing::info!(
            batch = %batch.id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            reviews = summary.reviews,
            "batch finished"
        );
        emitter.emit(ProgressEventKind::BatchFinished {
            succeeded: summary.succeeded,
            failed: summary.failed,
        });
        summary
    }
}

/// Per-job pipeline state.
struct JobRun<'a> {
    index: usize,
    config: &'a ScrapeConfig,
    cancel: &'a CancelToken,
}

impl JobRun<'_> {
    async fn execute(
        &self,
        job: &ScrapeJob,
        session: &mut BrowserSession,
        limiter: &mut RateLimiter,
        emitter: &mut ProgressEmitter,
    ) -> Result<JobResult, ScrapeError> {
        let place = resolver::resolve(&job.target, &self.config.resolver.language)?;
        tracing::debug!(job = self.index, url = %place.canonical_url, cid = ?place.cid, "resolved");

        let nav = self.navigate(&place, session, limiter, emitter).await?;
        emitter.emit(ProgressEventKind::Navigated {
            job: self.index,
            mode: nav.mode,
            place_name: nav.summary.name.clone(),
        });

        let requested = job.target_count;
        if nav.mode == PageMode::ReviewAbsent {
            tracing::info!(job = self.index, "place has no reviews tab");
            return Ok(JobResult {
                place,
                mode: nav.mode,
                summary: nav.summary,
                reviews: Vec::new(),
                requested,
                obtained: 0,
                load_stop: None,
                skipped_nodes: 0,
                note: Some(NOTE_NO_REVIEWS.to_string()),
            });
        }

        let ctx = session.context();
        let index = self.index;
        let load = loader::load(
            ctx,
            requested,
            &self.config.loader,
            self.cancel,
            &mut |attempt, present| {
                emitter.emit(ProgressEventKind::Loading {
                    job: index,
                    attempt,
                    present,
                    requested,
                })
            },
        )
        .await?;
        emitter.emit(ProgressEventKind::Loaded {
            job: index,
            present: load.present,
            stop: load.stop,
        });

        let extraction =
            parser::extract(ctx, load.node_selector, &place.source_ref(), self.cancel).await?;
        emitter.emit(ProgressEventKind::Parsing {
            job: index,
            nodes: extraction.nodes,
        });

        let mut set = ReviewSet::new();
        let added = set.extend(extraction.records);
        let parsed = extraction.nodes - extraction.skipped;
        if added < parsed {
            tracing::debug!(job = index, duplicates = parsed - added, "dropped duplicate reviews");
        }
        set.truncate(requested);
        let reviews = set.into_vec();

        Ok(JobResult {
            place,
            mode: nav.mode,
            summary: nav.summary,
            obtained: reviews.len(),
            reviews,
            requested,
            load_stop: Some(load.stop),
            skipped_nodes: extraction.skipped,
            note: None,
        })
    }

    /// Navigate, retrying a bounded number of times on a missing tab. Every
    /// attempt waits for the rate limiter and marks it afterwards.
    async fn navigate(
        &self,
        place: &ResolvedPlace,
        session: &mut BrowserSession,
        limiter: &mut RateLimiter,
        emitter: &mut ProgressEmitter,
    ) -> Result<NavigationOutcome, ScrapeError> {
        let retries = self.config.navigation.tab_retries;
        let mut attempt = 0;
        loop {
            let delay = limiter.remaining();
            if !delay.is_zero() {
                emitter.emit(ProgressEventKind::Waiting {
                    job: self.index,
                    delay_ms: delay.as_millis() as u64,
                });
            }
            limiter
                .wait(self.cancel)
                .await
                .map_err(|_| ScrapeError::Cancelled)?;

            let result = navigator::open(
                session.navigate_context(),
                place,
                &self.config.navigation,
                self.cancel,
            )
            .await;
            limiter.mark();

            match result {
                Ok(nav) => return Ok(nav),
                Err(NavigationError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(e) if e.is_retriable() && attempt < retries => {
                    attempt += 1;
                    tracing::warn!(job = self.index, attempt, retries, "{e}; navigating again");
                    emitter.emit(ProgressEventKind::Warning {
                        message: format!("job {}: {e}, retry {attempt}/{retries}", self.index),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
