// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Review node parsing.
//!
//! The in-page part ([`extract`]) opens truncated texts and pulls the outer
//! HTML of every loaded node. The per-node part ([`parse_review_node`]) is a
//! pure function over that HTML: a node without an id is skipped, every other
//! missing field leaves a partially filled record.

use crate::cancel::CancelToken;
use crate::error::{ParseSkip, ScrapeError};
use crate::locator;
use crate::renderer::RenderContext;
use crate::types::ReviewRecord;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;

const AUTHOR: &[&str] = &[".d4r55", ".WNxzHc.qLhwHc", ".WNxzHc"];
const RATING_LABEL: &[&str] = &[r#"span.kvMYJc[aria-label]"#, r#"span[role="img"][aria-label]"#];
/// Compact layout renders the rating as `4/5` text.
const RATING_TEXT: &str = "span.fzvQIb";
const DATE: &[&str] = &["span.rsqaWe", "span.xRkPPb"];
const TEXT: &[&str] = &["span.wiI7pd", "div.MyEned"];

const OWNER_RESPONSE: &[&str] = &["オーナーからの返信", "Response from the owner"];

/// Pause after clicking "show more" controls.
const EXPAND_SETTLE: Duration = Duration::from_millis(500);

fn selectors(list: &'static [&'static str]) -> Vec<Selector> {
    list.iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

struct Selectors {
    review_root: Selector,
    any: Selector,
    author: Vec<Selector>,
    rating_label: Vec<Selector>,
    rating_text: Selector,
    date: Vec<Selector>,
    text: Vec<Selector>,
}

fn sel() -> &'static Selectors {
    static SEL: OnceLock<Selectors> = OnceLock::new();
    SEL.get_or_init(|| Selectors {
        review_root: Selector::parse("[data-review-id]").expect("valid selector"),
        any: Selector::parse("*").expect("valid selector"),
        author: selectors(AUTHOR),
        rating_label: selectors(RATING_LABEL),
        rating_text: Selector::parse(RATING_TEXT).expect("valid selector"),
        date: selectors(DATE),
        text: selectors(TEXT),
    })
}

fn star_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)([1-5])(?:\.0)?\s*(?:つ星|stars?)|星\s*([1-5])\s*つ").expect("valid regex")
    })
}

fn star_fraction() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([1-5])(?:\.0)?\s*/\s*5").expect("valid regex"))
}

/// Parse one review node's outer HTML.
pub fn parse_review_node(html: &str, place_ref: &str) -> Result<ReviewRecord, ParseSkip> {
    let fragment = Html::parse_fragment(html);
    let s = sel();

    let root = match fragment.select(&s.review_root).next() {
        Some(el) => el,
        None => {
            // the fragment wrapper is always present; look for real content
            let has_element = fragment
                .select(&s.any)
                .any(|e| !matches!(e.value().name(), "html" | "body" | "head"));
            return Err(if has_element {
                ParseSkip::MissingId
            } else {
                ParseSkip::NoReviewElement
            });
        }
    };

    let review_id = root
        .value()
        .attr("data-review-id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ParseSkip::MissingId)?
        .to_string();

    let author = s.author.iter().find_map(|sel| first_text(root, sel));
    let rating = parse_rating(root, s);
    let date_text = s.date.iter().find_map(|sel| first_text(root, sel));
    let text = s
        .text
        .iter()
        .find_map(|sel| root.select(sel).next())
        .map(|e| clean_text(&e.text().collect::<String>()))
        .unwrap_or_default();

    Ok(ReviewRecord {
        review_id,
        author,
        rating,
        date_text,
        text,
        place_ref: place_ref.to_string(),
    })
}

/// First non-empty text node under the first match of `sel`.
fn first_text(root: ElementRef<'_>, sel: &Selector) -> Option<String> {
    root.select(sel).find_map(|e| {
        e.text()
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
    })
}

fn parse_rating(root: ElementRef<'_>, s: &Selectors) -> Option<u8> {
    let from_label = s.rating_label.iter().find_map(|sel| {
        root.select(sel).find_map(|e| {
            let label = e.value().attr("aria-label")?;
            let caps = star_label().captures(label)?;
            caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()
        })
    });
    from_label.or_else(|| {
        let text: String = root.select(&s.rating_text).next()?.text().collect();
        star_fraction().captures(&text)?[1].parse().ok()
    })
}

/// Drop the owner response and leftover "show more" labels.
pub fn clean_text(raw: &str) -> String {
    let mut text = raw;
    for marker in OWNER_RESPONSE {
        if let Some(pos) = text.find(marker) {
            text = &text[..pos];
        }
    }
    let mut text = text.replace("もっと見る", "");
    let trimmed = text.trim_end();
    if let Some(rest) = trimmed.strip_suffix("More") {
        if rest.is_empty() || rest.ends_with(char::is_whitespace) || rest.ends_with('…') {
            text = rest.to_string();
        }
    }
    text.trim().to_string()
}

/// Records parsed out of the page, plus the number of nodes dropped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<ReviewRecord>,
    pub nodes: usize,
    pub skipped: usize,
}

/// Expand truncated texts, then parse every node matching `node_selector`.
pub async fn extract(
    ctx: &dyn RenderContext,
    node_selector: &str,
    place_ref: &str,
    cancel: &CancelToken,
) -> Result<Extraction, ScrapeError> {
    match ctx
        .expand_truncated(node_selector, locator::EXPAND_BUTTON)
        .await
    {
        Ok(0) => {}
        Ok(clicked) => {
            tracing::debug!(clicked, "expanded truncated reviews");
            cancel
                .sleep(EXPAND_SETTLE)
                .await
                .map_err(|_| ScrapeError::Cancelled)?;
        }
        Err(e) => tracing::warn!("expanding reviews failed: {e:#}"),
    }

    let nodes = ctx
        .outer_html_all(node_selector)
        .await
        .map_err(ScrapeError::browser)?;

    let mut out = Extraction {
        nodes: nodes.len(),
        ..Extraction::default()
    };
    for (i, html) in nodes.iter().enumerate() {
        match parse_review_node(html, place_ref) {
            Ok(record) => out.records.push(record),
            Err(skip) => {
                tracing::debug!(node = i, "skipping review node: {skip}");
                out.skipped += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedContext, ScriptedPage};

    const FULL: &str = r#"
<div class="jftiEf fontBodyMedium" data-review-id="ChZDSUhNMG9nS0VJQ0FnSUR">
  <div class="d4r55 ">
    山田 太郎
  </div>
  <div class="RfnDt">ローカルガイド · 32 件のクチコミ</div>
  <span class="kvMYJc" role="img" aria-label="4 つ星"><span class="hCCjke"></span></span>
  <span class="rsqaWe">2 か月前</span>
  <div class="MyEned"><span class="wiI7pd">コーヒーが美味しい。店員さんも親切でした。 もっと見る</span></div>
  <div class="CDe7pd"><span class="nM6d2c">オーナーからの返信</span></div>
</div>"#;

    #[test]
    fn test_full_node() {
        let r = parse_review_node(FULL, "14363491530358300118").unwrap();
        assert_eq!(r.review_id, "ChZDSUhNMG9nS0VJQ0FnSUR");
        assert_eq!(r.author.as_deref(), Some("山田 太郎"));
        assert_eq!(r.rating, Some(4));
        assert_eq!(r.date_text.as_deref(), Some("2 か月前"));
        assert_eq!(r.text, "コーヒーが美味しい。店員さんも親切でした。");
        assert_eq!(r.place_ref, "14363491530358300118");
    }

    #[test]
    fn test_english_layout() {
        let html = r#"<div data-review-id="abc"><div class="WNxzHc qLhwHc"><button>Jane Doe</button></div>
            <span role="img" aria-label="5 stars"></span><span class="rsqaWe">a week ago</span>
            <span class="wiI7pd">Great place … More</span></div>"#;
        let r = parse_review_node(html, "p").unwrap();
        assert_eq!(r.author.as_deref(), Some("Jane Doe"));
        assert_eq!(r.rating, Some(5));
        assert_eq!(r.text, "Great place …");
    }

    #[test]
    fn test_missing_rating_is_unrated() {
        let html = r#"<div data-review-id="x1"><span class="wiI7pd">ok</span></div>"#;
        let r = parse_review_node(html, "p").unwrap();
        assert_eq!(r.rating, None);
        assert_eq!(r.author, None);
        assert_eq!(r.date_text, None);
        assert_eq!(r.text, "ok");
    }

    #[test]
    fn test_fraction_rating() {
        let html = r#"<div data-review-id="x2"><span class="fzvQIb">3/5</span></div>"#;
        assert_eq!(parse_review_node(html, "p").unwrap().rating, Some(3));
    }

    #[test]
    fn test_alternate_star_label() {
        let html = r#"<div data-review-id="x3"><span class="kvMYJc" aria-label="星 2 つ"></span></div>"#;
        assert_eq!(parse_review_node(html, "p").unwrap().rating, Some(2));
    }

    #[test]
    fn test_skips() {
        assert_eq!(
            parse_review_node(r#"<div class="jftiEf"><span>no id</span></div>"#, "p"),
            Err(ParseSkip::MissingId)
        );
        assert_eq!(
            parse_review_node(r#"<div data-review-id="  "></div>"#, "p"),
            Err(ParseSkip::MissingId)
        );
        assert_eq!(parse_review_node("", "p"), Err(ParseSkip::NoReviewElement));
        assert_eq!(
            parse_review_node("just text", "p"),
            Err(ParseSkip::NoReviewElement)
        );
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("良い店です。オーナーからの返信 ありがとうございます"),
            "良い店です。"
        );
        assert_eq!(
            clean_text("Nice. Response from the owner Thanks!"),
            "Nice."
        );
        assert_eq!(clean_text("More coffee please"), "More coffee please");
        assert_eq!(clean_text("  spacious  "), "spacious");
    }

    #[tokio::test]
    async fn test_extract_counts_skips() {
        let mut page = ScriptedPage::capable(3);
        page.reviews
            .push(r#"<div class="jftiEf"><span class="wiI7pd">orphan</span></div>"#.to_string());
        page.initially_rendered = 4;
        let ctx = ScriptedContext::new(page);

        let out = extract(&ctx, "div[data-review-id]", "42", &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(out.nodes, 4);
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.records[1].rating, Some(2));
        assert_eq!(out.records[2].text, "Review text 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_reads_expanded_text() {
        let mut page = ScriptedPage::capable(2);
        let short = crate::testing::review_html(0)
            .replace("Review text 0", "Review te… もっと見る");
        page.truncated.push((0, short));
        let ctx = ScriptedContext::new(page);
        let log = ctx.log();

        let out = extract(&ctx, "div[data-review-id]", "42", &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].text, "Review text 0");
        assert_eq!(out.records[1].text, "Review text 1");

        let calls = log.lock().unwrap().calls.clone();
        let expand_at = calls.iter().position(|c| c == "expand").unwrap();
        let read_at = calls.iter().position(|c| c == "outer-html").unwrap();
        assert!(expand_at < read_at);
    }
}
