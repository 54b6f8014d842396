// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Running a set of jobs end to end: progress display, cancellation on
//! Ctrl-C, browser teardown.

use crate::display;
use mapreviews::progress;
use mapreviews::{cancel_pair, BatchJob, CancelToken, Orchestrator, ScrapeJob};

/// Run `jobs` as one batch. The orchestrator's browser is shut down before
/// this returns, whatever the outcome.
pub async fn run_jobs(
    orchestrator: Orchestrator,
    jobs: Vec<ScrapeJob>,
    cancel: &CancelToken,
    show_progress: bool,
) -> BatchJob {
    let mut batch = BatchJob::new(jobs);

    let (orchestrator, display_task) = if show_progress {
        let (tx, rx) = progress::channel();
        let bar = display::job_bar(batch.jobs.len());
        let task = tokio::spawn(display::follow(rx, bar));
        (orchestrator.with_progress(tx), Some(task))
    } else {
        (orchestrator, None)
    };

    orchestrator.run_batch(&mut batch, cancel).await;

    if let Err(e) = orchestrator.shutdown().await {
        tracing::warn!("browser shutdown failed: {e:#}");
    }
    drop(orchestrator);

    if let Some(task) = display_task {
        let _ = task.await;
    }
    batch
}

/// Run `jobs` with Ctrl-C wired to cancellation.
pub async fn run_interruptible(
    orchestrator: Orchestrator,
    jobs: Vec<ScrapeJob>,
    show_progress: bool,
) -> BatchJob {
    let (handle, token) = cancel_pair();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing current step and stopping");
            handle.cancel();
        }
    });

    let batch = run_jobs(orchestrator, jobs, &token, show_progress).await;
    watcher.abort();
    batch
}
