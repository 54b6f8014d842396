// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scroll-driven review loading.
//!
//! Each attempt jumps the review list to its bottom, waits for lazy loading
//! to settle, nudges the list in small steps and re-counts the rendered
//! nodes. Loading ends when the target is present, after `stall_limit`
//! attempts in a row without growth, or at `max_attempts`. Falling short of
//! the target is a normal outcome, not an error.

use crate::cancel::CancelToken;
use crate::config::LoaderConfig;
use crate::error::ScrapeError;
use crate::locator::{self, SCROLL_CONTAINER};
use crate::renderer::{ElementRef, RenderContext};
use crate::types::LoadStop;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Review nodes present when loading stopped.
    pub present: usize,
    pub attempts: u32,
    pub stop: LoadStop,
    /// Selector the nodes were counted with; the parser reuses it.
    pub node_selector: &'static str,
}

/// Reveal review nodes until `target` are present or progress stops.
///
/// `on_attempt` is called after every attempt with the attempt number and
/// the node count.
pub async fn load(
    ctx: &dyn RenderContext,
    target: usize,
    config: &LoaderConfig,
    cancel: &CancelToken,
    on_attempt: &mut (dyn FnMut(u32, usize) + Send),
) -> Result<LoadOutcome, ScrapeError> {
    let (mut present, mut node_selector) = locator::count_review_nodes(ctx)
        .await
        .map_err(ScrapeError::browser)?;
    let mut attempts = 0u32;
    let mut stalls = 0u32;

    let outcome = |present, attempts, stop, node_selector| LoadOutcome {
        present,
        attempts,
        stop,
        node_selector,
    };

    if present >= target {
        return Ok(outcome(present, 0, LoadStop::TargetReached, node_selector));
    }

    while attempts < config.max_attempts {
        cancel.check().map_err(|_| ScrapeError::Cancelled)?;

        // re-located every attempt; the list re-renders while loading
        let container = match locator::locate(ctx, SCROLL_CONTAINER)
            .await
            .map_err(ScrapeError::browser)?
        {
            Some(found) => found.element,
            None => {
                tracing::warn!(present, "review list container not found");
                return Ok(outcome(present, attempts, LoadStop::NoContainer, node_selector));
            }
        };

        attempts += 1;
        let limit = Duration::from_millis(config.attempt_timeout_ms);
        let (after, selector) =
            match tokio::time::timeout(limit, attempt(ctx, &container, config, cancel)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ScrapeError::LoaderTimeout {
                        attempt: attempts,
                        timeout_ms: config.attempt_timeout_ms,
                    })
                }
            };
        node_selector = selector;

        tracing::debug!(attempt = attempts, count = after, target, "scroll attempt");
        on_attempt(attempts, after);

        if after >= target {
            return Ok(outcome(after, attempts, LoadStop::TargetReached, node_selector));
        }
        if after > present {
            stalls = 0;
        } else {
            stalls += 1;
        }
        present = after;

        if stalls >= config.stall_limit {
            tracing::info!(present, target, attempts, "no new reviews; list exhausted");
            return Ok(outcome(present, attempts, LoadStop::Exhausted, node_selector));
        }
    }

    tracing::info!(present, target, "attempt ceiling reached");
    Ok(outcome(present, attempts, LoadStop::CeilingReached, node_selector))
}

async fn attempt(
    ctx: &dyn RenderContext,
    container: &ElementRef,
    config: &LoaderConfig,
    cancel: &CancelToken,
) -> Result<(usize, &'static str), ScrapeError> {
    let pause = |ms: u64| async move {
        cancel
            .sleep(Duration::from_millis(ms))
            .await
            .map_err(|_| ScrapeError::Cancelled)
    };

    ctx.scroll_to_bottom(container)
        .await
        .map_err(ScrapeError::browser)?;
    pause(config.settle_ms + jitter(config.jitter_ms)).await?;

    for _ in 0..config.step_count {
        ctx.scroll_by(container, config.step_px)
            .await
            .map_err(ScrapeError::browser)?;
        pause(config.step_pause_ms).await?;
    }
    pause(config.post_steps_ms).await?;

    locator::count_review_nodes(ctx)
        .await
        .map_err(ScrapeError::browser)
}

fn jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::testing::{ScriptedContext, ScriptedPage};

    fn config() -> LoaderConfig {
        LoaderConfig::default()
    }

    async fn run(ctx: &ScriptedContext, target: usize, config: &LoaderConfig) -> LoadOutcome {
        load(ctx, target, config, &CancelToken::never(), &mut |_, _| {})
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_target() {
        let ctx = ScriptedContext::new(ScriptedPage::capable(100));
        let out = run(&ctx, 35, &config()).await;
        assert_eq!(out.stop, LoadStop::TargetReached);
        assert_eq!(out.present, 40);
        assert_eq!(out.attempts, 3);
        assert_eq!(out.node_selector, "div.jftiEf[data-review-id]");
        let log = ctx.log();
        let log = log.lock().unwrap();
        assert_eq!(log.scroll_jumps, 3);
        assert_eq!(log.scroll_steps, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undershoot_exhausts_after_two_stalls() {
        let ctx = ScriptedContext::new(ScriptedPage::capable(30));
        let out = run(&ctx, 50, &config()).await;
        assert_eq!(out.stop, LoadStop::Exhausted);
        assert_eq!(out.present, 30);
        // 20, 30, then two attempts without growth
        assert_eq!(out.attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_present() {
        let ctx = ScriptedContext::new(ScriptedPage::capable(30));
        let out = run(&ctx, 5, &config()).await;
        assert_eq!(out.stop, LoadStop::TargetReached);
        assert_eq!(out.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_bounds_attempts() {
        let mut page = ScriptedPage::capable(1000);
        page.batch_size = 1;
        let ctx = ScriptedContext::new(page);
        let cfg = LoaderConfig {
            max_attempts: 7,
            ..config()
        };
        let mut seen = Vec::new();
        let out = load(&ctx, 500, &cfg, &CancelToken::never(), &mut |a, n| {
            seen.push((a, n))
        })
        .await
        .unwrap();
        assert_eq!(out.stop, LoadStop::CeilingReached);
        assert_eq!(out.attempts, 7);
        assert_eq!(out.present, 17);
        assert_eq!(seen.len(), 7);
        assert_eq!(seen[0], (1, 11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_container() {
        let mut page = ScriptedPage::capable(40);
        page.has_container = false;
        let ctx = ScriptedContext::new(page);
        let out = run(&ctx, 40, &config()).await;
        assert_eq!(out.stop, LoadStop::NoContainer);
        assert_eq!(out.present, 10);
        assert_eq!(out.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let mut page = ScriptedPage::capable(40);
        page.scroll_delay = Some(Duration::from_secs(120));
        let ctx = ScriptedContext::new(page);
        let err = load(&ctx, 40, &config(), &CancelToken::never(), &mut |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ScrapeError::LoaderTimeout {
                attempt: 1,
                timeout_ms: 30_000
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_between_attempts() {
        let ctx = ScriptedContext::new(ScriptedPage::capable(100));
        let (handle, token) = cancel_pair();
        handle.cancel();
        let err = load(&ctx, 50, &config(), &token, &mut |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err, ScrapeError::Cancelled);
    }

    #[test]
    fn test_jitter_bounds() {
        assert_eq!(jitter(0), 0);
        for _ in 0..100 {
            assert!(jitter(250) <= 250);
        }
    }
}
