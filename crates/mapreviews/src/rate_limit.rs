// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inter-navigation spacing for batch runs.
//!
//! The limiter records when a navigation finished and holds the next one back
//! until `min_interval` has elapsed since then. Every navigation goes through
//! it, including tab-not-found retries, so the site never sees two page loads
//! from one session closer together than the configured floor.

use crate::cancel::{CancelToken, Cancelled};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_navigation_end: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_navigation_end: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Record the end of a navigation, successful or not.
    pub fn mark(&mut self) {
        self.last_navigation_end = Some(Instant::now());
    }

    /// Time still to wait before the next navigation may start.
    pub fn remaining(&self) -> Duration {
        match self.last_navigation_end {
            Some(end) => self.min_interval.saturating_sub(end.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait out the remaining interval. Returns how long it slept.
    pub async fn wait(&self, cancel: &CancelToken) -> Result<Duration, Cancelled> {
        let delay = self.remaining();
        if !delay.is_zero() {
            tracing::info!(delay_ms = delay.as_millis() as u64, "rate limit: holding next navigation");
        }
        cancel.sleep(delay).await?;
        Ok(delay)
    }
}
