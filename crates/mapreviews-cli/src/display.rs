// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal progress for a running batch.

use indicatif::{ProgressBar, ProgressStyle};
use mapreviews::progress::{ProgressEventKind, ProgressReceiver};
use tokio::sync::broadcast::error::RecvError;

/// Human-readable status line for an event.
pub fn describe(event: &ProgressEventKind) -> String {
    match event {
        ProgressEventKind::JobStarted { target, requested, .. } => {
            format!("{} ({requested} requested)", truncate(target, 40))
        }
        ProgressEventKind::Waiting { delay_ms, .. } => {
            format!("waiting {:.1}s before next page", *delay_ms as f64 / 1000.0)
        }
        ProgressEventKind::Navigated {
            mode, place_name, ..
        } => match place_name {
            Some(name) => format!("{} [{mode}]", truncate(name, 30)),
            None => format!("[{mode}]"),
        },
        ProgressEventKind::Loading {
            attempt,
            present,
            requested,
            ..
        } => format!("loading {present}/{requested} (scroll {attempt})"),
        ProgressEventKind::Loaded { present, stop, .. } => {
            format!("loaded {present} ({stop:?})")
        }
        ProgressEventKind::Parsing { nodes, .. } => format!("parsing {nodes} reviews"),
        ProgressEventKind::JobFinished {
            obtained,
            requested,
            failure,
            ..
        } => match failure {
            Some(reason) => format!("failed: {reason}"),
            None => format!("done {obtained}/{requested}"),
        },
        ProgressEventKind::BatchFinished { succeeded, failed } => {
            format!("finished: {succeeded} ok, {failed} failed")
        }
        ProgressEventKind::Warning { message } => message.clone(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

pub fn job_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Drive `bar` from progress events until the batch finishes or the sender
/// goes away.
pub async fn follow(mut rx: ProgressReceiver, bar: ProgressBar) {
    loop {
        match rx.recv().await {
            Ok(ev) => {
                if let ProgressEventKind::JobFinished { .. } = ev.event {
                    bar.inc(1);
                }
                bar.set_message(describe(&ev.event));
                if let ProgressEventKind::BatchFinished { .. } = ev.event {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::debug!(skipped = n, "progress display lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    bar.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapreviews::{BatchJob, LoadStop, PageMode};

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&ProgressEventKind::Loading {
                job: 0,
                attempt: 3,
                present: 20,
                requested: 50
            }),
            "loading 20/50 (scroll 3)"
        );
        assert_eq!(
            describe(&ProgressEventKind::Waiting {
                job: 1,
                delay_ms: 12_500
            }),
            "waiting 12.5s before next page"
        );
        assert_eq!(
            describe(&ProgressEventKind::Navigated {
                job: 0,
                mode: PageMode::ReviewAbsent,
                place_name: None
            }),
            "[review-absent]"
        );
        assert_eq!(
            describe(&ProgressEventKind::Loaded {
                job: 0,
                present: 7,
                stop: LoadStop::Exhausted
            }),
            "loaded 7 (Exhausted)"
        );
        assert_eq!(
            describe(&ProgressEventKind::JobFinished {
                job: 0,
                obtained: 0,
                requested: 5,
                failure: Some("timeout".into())
            }),
            "failed: timeout"
        );
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("あいうえおかきくけこ", 6), "あいう...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn test_follow_counts_finished_jobs() {
        let (tx, rx) = mapreviews::progress::channel();
        let mut emitter = mapreviews::progress::ProgressEmitter::new(Some(tx), BatchJob::new(Vec::new()).id);
        let bar = ProgressBar::hidden();
        bar.set_length(2);

        emitter.emit(ProgressEventKind::JobFinished {
            job: 0,
            obtained: 1,
            requested: 1,
            failure: None,
        });
        emitter.emit(ProgressEventKind::JobFinished {
            job: 1,
            obtained: 0,
            requested: 1,
            failure: Some("browser".into()),
        });
        emitter.emit(ProgressEventKind::BatchFinished {
            succeeded: 1,
            failed: 1,
        });

        follow(rx, bar.clone()).await;
        assert_eq!(bar.position(), 2);
    }
}
