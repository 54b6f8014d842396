// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered element lookup.
//!
//! Google Maps class names and labels change without notice, so every element
//! the navigator or loader touches is described by an ordered list of
//! strategies. Lists are evaluated from the top on every call; a winning
//! strategy is never remembered across navigations.

use crate::renderer::{ElementRef, RenderContext, Requirement};
use anyhow::Result;

/// One way of finding an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    /// Short label for logs.
    pub name: &'static str,
    pub selector: &'static str,
    pub require: Requirement,
    /// Substring the element's text or aria-label must contain.
    pub text: Option<&'static str>,
}

impl Strategy {
    pub const fn new(name: &'static str, selector: &'static str, require: Requirement) -> Self {
        Self {
            name,
            selector,
            require,
            text: None,
        }
    }

    pub const fn with_text(mut self, text: &'static str) -> Self {
        self.text = Some(text);
        self
    }
}

/// A strategy that matched, and the element it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub strategy: &'static str,
    pub element: ElementRef,
}

/// Evaluate `strategies` in order and return the first satisfied match.
///
/// A strategy whose evaluation errors is logged and skipped.
pub async fn locate(
    ctx: &dyn RenderContext,
    strategies: &[Strategy],
) -> Result<Option<Located>> {
    for s in strategies {
        match ctx.find_element(s.selector, s.require, s.text).await {
            Ok(Some(index)) => {
                tracing::debug!(strategy = s.name, selector = s.selector, index, "located");
                return Ok(Some(Located {
                    strategy: s.name,
                    element: ElementRef::new(s.selector, index),
                }));
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(strategy = s.name, "strategy failed: {e:#}"),
        }
    }
    Ok(None)
}

/// Reviews tab, most to least specific.
pub const REVIEW_TAB: &[Strategy] = &[
    Strategy::new(
        "aria-label",
        r#"button[role="tab"][aria-label*="クチコミ"]"#,
        Requirement::Visible,
    ),
    Strategy::new(
        "aria-label",
        r#"button[aria-label*="のクチコミ"]"#,
        Requirement::Visible,
    ),
    Strategy::new(
        "aria-label",
        r#"button[role="tab"][aria-label*="Reviews"]"#,
        Requirement::Visible,
    ),
    Strategy::new(
        "tab-index",
        r#"button[role="tab"][data-tab-index="1"]"#,
        Requirement::Visible,
    ),
    Strategy::new("class-name", "button.hh2c6", Requirement::Visible).with_text("クチコミ"),
    Strategy::new("class-name", "button.hh2c6", Requirement::Visible).with_text("Reviews"),
];

/// Any tab control; used to count the rendered tab set.
pub const TAB: &str = r#"button[role="tab"]"#;

/// Labeled reviews tab, presence only. Drives layout detection.
pub const REVIEW_TAB_LABELED: &[Strategy] = &[
    Strategy::new(
        "aria-label",
        r#"button[role="tab"][aria-label*="クチコミ"]"#,
        Requirement::Present,
    ),
    Strategy::new(
        "aria-label",
        r#"button[aria-label*="のクチコミ"]"#,
        Requirement::Present,
    ),
    Strategy::new(
        "aria-label",
        r#"button[role="tab"][aria-label*="Reviews"]"#,
        Requirement::Present,
    ),
];

/// Scroll root of the review list.
pub const SCROLL_CONTAINER: &[Strategy] = &[
    Strategy::new(
        "class-name",
        "div.m6QErb.DxyBCb.kA9KIf.dS8AEf.XiKgde",
        Requirement::Scrollable,
    ),
    Strategy::new("class-name", "div.m6QErb.XiKgde", Requirement::Scrollable),
    Strategy::new("class-name", "div.m6QErb.DxyBCb", Requirement::Scrollable),
    Strategy::new("role", r#"div[role="main"]"#, Requirement::Scrollable),
    Strategy::new("class-name", "div.m6QErb", Requirement::Scrollable),
];

/// Review nodes. The first selector with matches is used for counting and
/// extraction so one node is never counted twice.
pub const REVIEW_NODE: &[&str] = &["div.jftiEf[data-review-id]", "div[data-review-id]"];

/// "Show more" controls inside a review node.
pub const EXPAND_BUTTON: &str = r#"button[aria-label*="もっと見る"], button.w8nwRe.kyuRq, button.w8nwRe, button[aria-label="See more"]"#;

/// Consent and cookie banners.
pub const CONSENT: &[Strategy] = &[
    Strategy::new(
        "aria-label",
        r#"button[aria-label*="すべて拒否"]"#,
        Requirement::Visible,
    ),
    Strategy::new("aria-label", r#"button[aria-label*="同意"]"#, Requirement::Visible),
    Strategy::new(
        "aria-label",
        r#"button[aria-label*="Reject all"]"#,
        Requirement::Visible,
    ),
    Strategy::new("form", r#"form[action*="consent"] button"#, Requirement::Visible),
];

/// First place in a search result list.
pub const SEARCH_RESULT: &[Strategy] = &[
    Strategy::new("href", r#"a[href*="/maps/place/"]"#, Requirement::Present),
    Strategy::new("class-name", "div.Nv2PK", Requirement::Present),
];

pub const SORT_BUTTON: &[Strategy] = &[
    Strategy::new("data-value", r#"button[data-value="Sort"]"#, Requirement::Visible),
    Strategy::new(
        "aria-label",
        r#"button[aria-label*="並べ替え"]"#,
        Requirement::Visible,
    ),
    Strategy::new(
        "aria-label",
        r#"button[aria-label*="Sort"]"#,
        Requirement::Visible,
    ),
];

pub const SORT_NEWEST: &[Strategy] = &[
    Strategy::new("menu-item", r#"div[role="menuitemradio"]"#, Requirement::Visible)
        .with_text("新しい順"),
    Strategy::new("menu-item", r#"div[role="menuitemradio"]"#, Requirement::Visible)
        .with_text("Newest"),
];

pub const PLACE_NAME: &str = "h1";
pub const AVERAGE_RATING: &str = r#"div.F7nice span[aria-hidden="true"]"#;
/// Control whose aria-label carries the total review count.
pub const REVIEW_COUNT_LABEL: &[&str] = &[
    r#"button[aria-label*="件のクチコミ"]"#,
    r#"button[aria-label*="reviews"]"#,
];

/// Count review nodes with the first selector that matches anything.
/// Returns the selector used alongside the count.
pub async fn count_review_nodes(ctx: &dyn RenderContext) -> Result<(usize, &'static str)> {
    for sel in REVIEW_NODE {
        let n = ctx.count(sel).await?;
        if n > 0 {
            return Ok((n, sel));
        }
    }
    Ok((0, REVIEW_NODE[0]))
}
