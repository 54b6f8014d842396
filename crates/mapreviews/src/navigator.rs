// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page navigation and layout detection.
//!
//! One call to [`open`] performs exactly one page load, then works the page
//! into a state the loader can use:
//!
//! 1. load the resolved URL (bounded by `navigation.timeout_ms`)
//! 2. dismiss a consent banner if one is shown
//! 3. on search pages, open the first place result
//! 4. classify the layout from the rendered tab set, polling while the tabs
//!    are still rendering
//! 5. read the place header
//! 6. on review-capable pages, select the reviews tab and sort newest first
//!
//! Retrying after `tab-not-found` is the caller's decision; the rate limiter
//! has to see every navigation.

use crate::cancel::CancelToken;
use crate::config::NavigationConfig;
use crate::error::NavigationError;
use crate::locator::{self, Strategy};
use crate::renderer::{NavigationTimeout, RenderContext};
use crate::types::{PageMode, PlaceSummary, ResolvedPlace};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;

/// Slack on top of the renderer's own navigation timeout.
const TIMEOUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOutcome {
    pub mode: PageMode,
    pub summary: PlaceSummary,
    pub final_url: String,
    /// Which tab strategy won, for review-capable pages.
    pub tab_strategy: Option<&'static str>,
    pub sorted_newest: bool,
}

/// Layout from the rendered tab set.
///
/// A labeled reviews tab, or three or more tabs, means the review-capable
/// layout. One or two tabs (overview, about) means review-absent. No tabs
/// means the panel has not rendered yet.
pub fn classify(has_review_tab: bool, tab_count: usize) -> PageMode {
    if has_review_tab || tab_count >= 3 {
        PageMode::ReviewCapable
    } else if tab_count > 0 {
        PageMode::ReviewAbsent
    } else {
        PageMode::Unknown
    }
}

fn browser(e: anyhow::Error) -> NavigationError {
    NavigationError::Browser(format!("{e:#}"))
}

async fn pause(cancel: &CancelToken, ms: u64) -> Result<(), NavigationError> {
    cancel
        .sleep(Duration::from_millis(ms))
        .await
        .map_err(|_| NavigationError::Cancelled)
}

/// Click the first match of `strategies`. Returns the winning strategy.
async fn click_first(
    ctx: &dyn RenderContext,
    strategies: &[Strategy],
) -> Result<Option<&'static str>, NavigationError> {
    match locator::locate(ctx, strategies).await.map_err(browser)? {
        Some(found) => {
            let clicked = ctx.click(&found.element).await.map_err(browser)?;
            Ok(clicked.then_some(found.strategy))
        }
        None => Ok(None),
    }
}

/// Load `place` and bring it to a loadable state.
pub async fn open(
    ctx: &mut dyn RenderContext,
    place: &ResolvedPlace,
    config: &NavigationConfig,
    cancel: &CancelToken,
) -> Result<NavigationOutcome, NavigationError> {
    cancel.check().map_err(|_| NavigationError::Cancelled)?;

    let url = place.canonical_url.as_str();
    tracing::info!(url, "navigating");
    let limit = Duration::from_millis(config.timeout_ms) + TIMEOUT_GRACE;
    let loaded = tokio::select! {
        r = tokio::time::timeout(limit, ctx.navigate(url, config.timeout_ms)) => r,
        _ = cancel.cancelled() => return Err(NavigationError::Cancelled),
    };
    let nav = match loaded {
        Ok(Ok(nav)) => nav,
        Ok(Err(e)) => {
            return Err(match e.downcast_ref::<NavigationTimeout>() {
                Some(t) => NavigationError::Timeout {
                    timeout_ms: t.timeout_ms,
                },
                None => browser(e),
            })
        }
        Err(_) => {
            return Err(NavigationError::Timeout {
                timeout_ms: config.timeout_ms,
            })
        }
    };
    tracing::debug!(final_url = %nav.final_url, load_ms = nav.load_time_ms, "page loaded");
    let ctx: &dyn RenderContext = ctx;

    pause(cancel, config.settle_ms).await?;

    if let Some(strategy) = click_first(ctx, locator::CONSENT).await? {
        tracing::info!(strategy, "dismissed consent banner");
        pause(cancel, config.click_settle_ms).await?;
    }

    if place.is_search {
        match click_first(ctx, locator::SEARCH_RESULT).await? {
            Some(strategy) => {
                tracing::info!(strategy, "opened first search result");
                pause(cancel, config.click_settle_ms).await?;
            }
            None => tracing::debug!("no search result list; treating page as a place"),
        }
    }

    let mode = detect_mode(ctx, config, cancel).await?;
    let summary = read_summary(ctx).await;
    tracing::info!(%mode, name = summary.name.as_deref().unwrap_or("-"), "layout detected");

    let mut outcome = NavigationOutcome {
        mode,
        summary,
        final_url: nav.final_url,
        tab_strategy: None,
        sorted_newest: false,
    };

    match mode {
        PageMode::ReviewAbsent => return Ok(outcome),
        PageMode::Unknown => {
            tracing::warn!("no tabs rendered before detection timeout");
            return Err(NavigationError::LayoutUnknown {
                timeout_ms: config.detect_timeout_ms,
            });
        }
        PageMode::ReviewCapable => {}
    }

    let Some(strategy) = click_first(ctx, locator::REVIEW_TAB).await? else {
        tracing::warn!("review-capable page but no reviews tab could be selected");
        return Err(NavigationError::TabNotFound);
    };
    tracing::info!(strategy, "reviews tab selected");
    outcome.tab_strategy = Some(strategy);
    pause(cancel, config.click_settle_ms).await?;

    if config.sort_newest {
        outcome.sorted_newest = match sort_newest(ctx, config, cancel).await {
            Ok(sorted) => sorted,
            Err(NavigationError::Cancelled) => return Err(NavigationError::Cancelled),
            Err(e) => {
                tracing::warn!("sorting by newest failed: {e}");
                false
            }
        };
    }

    Ok(outcome)
}

async fn detect_mode(
    ctx: &dyn RenderContext,
    config: &NavigationConfig,
    cancel: &CancelToken,
) -> Result<PageMode, NavigationError> {
    let deadline = Instant::now() + Duration::from_millis(config.detect_timeout_ms);
    loop {
        let labeled = locator::locate(ctx, locator::REVIEW_TAB_LABELED)
            .await
            .map_err(browser)?
            .is_some();
        let tabs = ctx.count(locator::TAB).await.map_err(browser)?;
        let mode = classify(labeled, tabs);
        tracing::debug!(labeled, tabs, %mode, "tab set");
        if mode != PageMode::Unknown || Instant::now() >= deadline {
            return Ok(mode);
        }
        pause(cancel, config.detect_poll_ms).await?;
    }
}

/// Open the sort menu and pick newest first. `Ok(false)` when either control
/// is missing.
async fn sort_newest(
    ctx: &dyn RenderContext,
    config: &NavigationConfig,
    cancel: &CancelToken,
) -> Result<bool, NavigationError> {
    if click_first(ctx, locator::SORT_BUTTON).await?.is_none() {
        tracing::debug!("sort control not found");
        return Ok(false);
    }
    pause(cancel, config.click_settle_ms / 2).await?;
    if click_first(ctx, locator::SORT_NEWEST).await?.is_none() {
        tracing::debug!("newest-first option not found");
        return Ok(false);
    }
    pause(cancel, config.click_settle_ms).await?;
    Ok(true)
}

fn review_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\d,]+)\s*(?:件|reviews?)").expect("valid regex"))
}

/// Total review count out of a label such as `1,234 件のクチコミ`.
pub fn parse_review_count(label: &str) -> Option<u64> {
    let caps = review_count_re().captures(label)?;
    caps[1].replace(',', "").parse().ok()
}

/// Best-effort header read. Missing pieces stay `None`.
pub async fn read_summary(ctx: &dyn RenderContext) -> PlaceSummary {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let mut name = non_empty(ctx.text_of(locator::PLACE_NAME).await.ok().flatten());
    if name.is_none() {
        let title = ctx.text_of("title").await.ok().flatten().unwrap_or_default();
        name = title
            .split_once(" - Google")
            .map(|(n, _)| n.trim().to_string())
            .filter(|n| !n.is_empty());
    }

    let average_rating = non_empty(ctx.text_of(locator::AVERAGE_RATING).await.ok().flatten());

    let mut review_count = None;
    for sel in locator::REVIEW_COUNT_LABEL {
        if let Ok(Some(label)) = ctx.attribute_of(sel, "aria-label").await {
            review_count = parse_review_count(&label);
            if review_count.is_some() {
                break;
            }
        }
    }

    PlaceSummary {
        name,
        average_rating,
        review_count,
    }
}
