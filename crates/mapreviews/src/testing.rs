// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scripted in-memory browser for tests.
//!
//! `ScriptedContext` answers the DOM operations of [`RenderContext`] from a
//! [`ScriptedPage`] description instead of running JavaScript. Selectors are
//! recognised by the fragments the locator tables use, so the navigator,
//! loader and orchestrator run unchanged against it.

use crate::renderer::{ElementRef, NavigationResult, RenderContext, Renderer, Requirement};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// How `navigate` behaves for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavBehavior {
    Load,
    Fail,
    /// Never finishes on its own.
    Hang,
}

/// Description of one place page.
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    pub nav: NavBehavior,
    pub name: Option<String>,
    pub average_rating: Option<String>,
    pub review_count: Option<u64>,
    /// A reviews tab labeled クチコミ is rendered.
    pub labeled_tab: bool,
    pub tab_count: usize,
    pub tab_visible: bool,
    /// Navigations (counted down) during which the tab renders invisible.
    pub hidden_tab_navigations: usize,
    /// Tab-count polls that see no tabs before they render.
    pub tabs_render_after_polls: usize,
    pub consent_banner: bool,
    /// The page is a search result list until the first result is clicked.
    pub search_results: bool,
    pub sort_menu: bool,
    pub has_container: bool,
    /// Outer HTML of every review the place has, in display order.
    pub reviews: Vec<String>,
    pub initially_rendered: usize,
    /// Nodes revealed per jump to the bottom.
    pub batch_size: usize,
    /// Delay inside every jump to the bottom.
    pub scroll_delay: Option<Duration>,
    /// Collapsed markup served for review `i` until its show-more control
    /// is clicked.
    pub truncated: Vec<(usize, String)>,
}

impl ScriptedPage {
    /// A review-capable page holding `total` reviews.
    pub fn capable(total: usize) -> Self {
        Self {
            nav: NavBehavior::Load,
            name: Some("テスト珈琲 本店".to_string()),
            average_rating: Some("4.3".to_string()),
            review_count: Some(total as u64),
            labeled_tab: true,
            tab_count: 3,
            tab_visible: true,
            hidden_tab_navigations: 0,
            tabs_render_after_polls: 0,
            consent_banner: false,
            search_results: false,
            sort_menu: true,
            has_container: true,
            reviews: (0..total).map(review_html).collect(),
            initially_rendered: total.min(10),
            batch_size: 10,
            scroll_delay: None,
            truncated: Vec::new(),
        }
    }

    /// The two-tab layout without reviews.
    pub fn absent() -> Self {
        Self {
            labeled_tab: false,
            tab_count: 2,
            review_count: None,
            sort_menu: false,
            has_container: false,
            reviews: Vec::new(),
            initially_rendered: 0,
            ..Self::capable(0)
        }
    }
}

/// Review node markup in the shape Google Maps renders.
pub fn review_html(i: usize) -> String {
    format!(
        r#"<div class="jftiEf fontBodyMedium" data-review-id="rev-{i}"><div class="d4r55">Reviewer {i}</div><span class="kvMYJc" role="img" aria-label="{stars} つ星"></span><span class="rsqaWe">{weeks} 週間前</span><span class="wiI7pd">Review text {i}</span></div>"#,
        stars = i % 5 + 1,
        weeks = i + 1,
    )
}

/// Everything the fake observed, shared with the test.
#[derive(Debug, Default)]
pub struct ScriptLog {
    /// Operation names in call order (`suppress`, `user-agent`, `locale`,
    /// `navigate`, `click:<selector>`, `expand`, `outer-html`, `close`,
    /// `shutdown`).
    pub calls: Vec<String>,
    /// URL and start instant of every navigation.
    pub navigations: Vec<(String, Instant)>,
    pub user_agent: Option<(String, String)>,
    pub locale: Option<String>,
    pub scroll_jumps: usize,
    pub scroll_steps: usize,
}

pub type SharedLog = Arc<Mutex<ScriptLog>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    ReviewNode,
    Container,
    SortMenuItem,
    SortButton,
    Consent,
    SearchResult,
    CountLabel,
    LabeledTab,
    IndexTab,
    AnyTab,
    Heading,
    Title,
    Rating,
    Unknown,
}

fn classify(selector: &str) -> Target {
    if selector.contains("data-review-id") {
        Target::ReviewNode
    } else if selector.contains("m6QErb") || selector.contains(r#"role="main""#) {
        Target::Container
    } else if selector.contains("menuitemradio") {
        Target::SortMenuItem
    } else if selector.contains(r#"data-value="Sort""#)
        || selector.contains("並べ替え")
        || selector.contains(r#"aria-label*="Sort""#)
    {
        Target::SortButton
    } else if selector.contains("すべて拒否")
        || selector.contains("同意")
        || selector.contains("Reject all")
        || selector.contains("consent")
    {
        Target::Consent
    } else if selector.contains("/maps/place/") || selector.contains("Nv2PK") {
        Target::SearchResult
    } else if selector.contains("件のクチコミ") || selector.contains(r#"*="reviews""#) {
        Target::CountLabel
    } else if selector.contains("クチコミ")
        || selector.contains("Reviews")
        || selector.contains("hh2c6")
    {
        Target::LabeledTab
    } else if selector.contains("data-tab-index") {
        Target::IndexTab
    } else if selector == r#"button[role="tab"]"# {
        Target::AnyTab
    } else if selector == "h1" {
        Target::Heading
    } else if selector == "title" {
        Target::Title
    } else if selector.contains("F7nice") {
        Target::Rating
    } else {
        Target::Unknown
    }
}

#[derive(Debug)]
struct State {
    url: String,
    pages: Vec<(String, ScriptedPage)>,
    fallback: ScriptedPage,
    page: ScriptedPage,
    rendered: usize,
    menu_open: bool,
    sorted_newest: bool,
    tab_selected: bool,
    expanded: bool,
}

impl State {
    fn tabs_rendered(&self) -> bool {
        !self.page.search_results && self.page.tabs_render_after_polls == 0
    }

    fn matches(&self, target: Target, require: Requirement, text: Option<&str>) -> bool {
        let p = &self.page;
        match target {
            Target::ReviewNode => self.rendered > 0,
            Target::Container => p.has_container,
            Target::SortMenuItem => {
                self.menu_open && text.map_or(true, |t| t == "新しい順" || t == "Newest")
            }
            Target::SortButton => p.sort_menu && self.tabs_rendered(),
            Target::Consent => p.consent_banner,
            Target::SearchResult => p.search_results,
            Target::CountLabel => p.review_count.is_some() && self.tabs_rendered(),
            Target::LabeledTab => {
                let text_ok = text.map_or(true, |t| t == "クチコミ");
                let visible_ok = require != Requirement::Visible || p.tab_visible;
                p.labeled_tab && self.tabs_rendered() && text_ok && visible_ok
            }
            Target::IndexTab => {
                let visible_ok = require != Requirement::Visible || p.tab_visible;
                p.tab_count >= 2 && self.tabs_rendered() && visible_ok
            }
            Target::AnyTab => p.tab_count > 0 && self.tabs_rendered(),
            Target::Heading => p.name.is_some(),
            Target::Title => true,
            Target::Rating => p.average_rating.is_some(),
            Target::Unknown => false,
        }
    }
}

/// In-memory [`RenderContext`].
pub struct ScriptedContext {
    state: Mutex<State>,
    log: SharedLog,
}

impl ScriptedContext {
    /// A context already showing `page`.
    pub fn new(page: ScriptedPage) -> Self {
        let ctx = Self::with_pages(Vec::new(), page, SharedLog::default());
        ctx.load_current();
        ctx
    }

    /// A blank context that serves the first page whose key is a substring
    /// of the navigated URL, or `fallback`.
    pub fn with_pages(
        pages: Vec<(String, ScriptedPage)>,
        fallback: ScriptedPage,
        log: SharedLog,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                pages,
                page: fallback.clone(),
                fallback,
                rendered: 0,
                menu_open: false,
                sorted_newest: false,
                tab_selected: false,
                expanded: false,
            }),
            log,
        }
    }

    pub fn log(&self) -> SharedLog {
        Arc::clone(&self.log)
    }

    pub fn sorted_newest(&self) -> bool {
        self.state.lock().unwrap().sorted_newest
    }

    pub fn tab_selected(&self) -> bool {
        self.state.lock().unwrap().tab_selected
    }

    fn load_current(&self) {
        let mut st = self.state.lock().unwrap();
        st.rendered = st.page.initially_rendered.min(st.page.reviews.len());
        st.menu_open = false;
        st.sorted_newest = false;
        st.tab_selected = false;
        st.expanded = false;
        if st.page.hidden_tab_navigations > 0 {
            st.page.tab_visible = false;
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.log.lock().unwrap().calls.push(call.into());
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        let behavior = {
            let mut log = self.log.lock().unwrap();
            log.calls.push("navigate".to_string());
            log.navigations.push((url.to_string(), Instant::now()));

            let mut st = self.state.lock().unwrap();
            st.url = url.to_string();
            let idx = st.pages.iter().position(|(key, _)| url.contains(key.as_str()));
            let page = match idx {
                Some(i) => {
                    let template = &mut st.pages[i].1;
                    let page = template.clone();
                    template.hidden_tab_navigations =
                        template.hidden_tab_navigations.saturating_sub(1);
                    page
                }
                None => {
                    let page = st.fallback.clone();
                    st.fallback.hidden_tab_navigations =
                        st.fallback.hidden_tab_navigations.saturating_sub(1);
                    page
                }
            };
            let behavior = page.nav;
            st.page = page;
            behavior
        };

        match behavior {
            NavBehavior::Load => {
                self.load_current();
                Ok(NavigationResult {
                    final_url: url.to_string(),
                    load_time_ms: 0,
                })
            }
            NavBehavior::Fail => bail!("net::ERR_CONNECTION_RESET"),
            NavBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                bail!("navigation never finished")
            }
        }
    }

    async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn get_html(&self) -> Result<String> {
        let st = self.state.lock().unwrap();
        Ok(st.page.reviews[..st.rendered].concat())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn suppress_automation_signature(&self) -> Result<()> {
        self.record("suppress");
        Ok(())
    }

    async fn set_user_agent(&self, user_agent: &str, accept_language: &str) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.calls.push("user-agent".to_string());
        log.user_agent = Some((user_agent.to_string(), accept_language.to_string()));
        Ok(())
    }

    async fn set_locale(&self, locale: &str) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.calls.push("locale".to_string());
        log.locale = Some(locale.to_string());
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.record("close");
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let mut st = self.state.lock().unwrap();
        let target = classify(selector);
        if target == Target::AnyTab
            && !st.page.search_results
            && st.page.tabs_render_after_polls > 0
        {
            st.page.tabs_render_after_polls -= 1;
            return Ok(0);
        }
        Ok(match target {
            Target::ReviewNode => st.rendered,
            Target::AnyTab if st.tabs_rendered() => st.page.tab_count,
            t if st.matches(t, Requirement::Present, None) => 1,
            _ => 0,
        })
    }

    async fn find_element(
        &self,
        selector: &str,
        require: Requirement,
        text: Option<&str>,
    ) -> Result<Option<usize>> {
        let st = self.state.lock().unwrap();
        Ok(st.matches(classify(selector), require, text).then_some(0))
    }

    async fn click(&self, el: &ElementRef) -> Result<bool> {
        self.record(format!("click:{}", el.selector));
        let mut st = self.state.lock().unwrap();
        let target = classify(&el.selector);
        if !st.matches(target, Requirement::Present, None) {
            return Ok(false);
        }
        match target {
            Target::LabeledTab | Target::IndexTab => st.tab_selected = true,
            Target::Consent => st.page.consent_banner = false,
            Target::SearchResult => st.page.search_results = false,
            Target::SortButton => st.menu_open = true,
            Target::SortMenuItem => {
                st.menu_open = false;
                st.sorted_newest = true;
            }
            _ => {}
        }
        Ok(true)
    }

    async fn scroll_to_bottom(&self, el: &ElementRef) -> Result<bool> {
        let delay = {
            let st = self.state.lock().unwrap();
            if classify(&el.selector) != Target::Container || !st.page.has_container {
                return Ok(false);
            }
            st.page.scroll_delay
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.log.lock().unwrap().scroll_jumps += 1;
        let mut st = self.state.lock().unwrap();
        st.rendered = (st.rendered + st.page.batch_size).min(st.page.reviews.len());
        Ok(true)
    }

    async fn scroll_by(&self, el: &ElementRef, _delta: i64) -> Result<bool> {
        self.log.lock().unwrap().scroll_steps += 1;
        Ok(classify(&el.selector) == Target::Container)
    }

    async fn outer_html_all(&self, selector: &str) -> Result<Vec<String>> {
        self.record("outer-html");
        let st = self.state.lock().unwrap();
        if classify(selector) != Target::ReviewNode {
            return Ok(Vec::new());
        }
        let nodes = (0..st.rendered)
            .map(|i| match st.page.truncated.iter().find(|(t, _)| *t == i) {
                Some((_, short)) if !st.expanded => short.clone(),
                _ => st.page.reviews[i].clone(),
            })
            .collect();
        Ok(nodes)
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        let st = self.state.lock().unwrap();
        Ok(match classify(selector) {
            Target::Heading => st.page.name.clone(),
            Target::Title => Some(match st.page.name {
                Some(ref n) => format!("{n} - Google マップ"),
                None => "Google マップ".to_string(),
            }),
            Target::Rating => st.page.average_rating.clone(),
            _ => None,
        })
    }

    async fn attribute_of(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let st = self.state.lock().unwrap();
        if classify(selector) == Target::CountLabel && attribute == "aria-label" {
            return Ok(st
                .page
                .review_count
                .map(|n| format!("{} 件のクチコミ", group_thousands(n))));
        }
        Ok(None)
    }

    async fn expand_truncated(&self, scope: &str, _buttons: &str) -> Result<usize> {
        self.record("expand");
        let mut st = self.state.lock().unwrap();
        if classify(scope) != Target::ReviewNode || st.expanded {
            return Ok(0);
        }
        let rendered = st.rendered;
        let clicked = st.page.truncated.iter().filter(|(i, _)| *i < rendered).count();
        st.expanded = true;
        Ok(clicked)
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Renderer handing out [`ScriptedContext`]s over one page table.
pub struct ScriptedRenderer {
    pages: Vec<(String, ScriptedPage)>,
    fallback: ScriptedPage,
    log: SharedLog,
    fail_new_context: bool,
    active: AtomicUsize,
}

impl ScriptedRenderer {
    pub fn new(fallback: ScriptedPage) -> Self {
        Self {
            pages: Vec::new(),
            fallback,
            log: SharedLog::default(),
            fail_new_context: false,
            active: AtomicUsize::new(0),
        }
    }

    /// Serve `page` for URLs containing `key`.
    pub fn page(mut self, key: &str, page: ScriptedPage) -> Self {
        self.pages.push((key.to_string(), page));
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_new_context: true,
            ..Self::new(ScriptedPage::capable(0))
        }
    }

    pub fn log(&self) -> SharedLog {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        if self.fail_new_context {
            bail!("browser process exited during startup");
        }
        self.active.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(ScriptedContext::with_pages(
            self.pages.clone(),
            self.fallback.clone(),
            Arc::clone(&self.log),
        )))
    }

    async fn shutdown(&self) -> Result<()> {
        self.log.lock().unwrap().calls.push("shutdown".to_string());
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(7), "7");
        assert_eq!(group_thousands(1234), "1,234");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[tokio::test]
    async fn test_scroll_reveals_batches() {
        let ctx = ScriptedContext::new(ScriptedPage::capable(25));
        let list = ElementRef::new("div.m6QErb", 0);
        assert_eq!(ctx.count("div[data-review-id]").await.unwrap(), 10);
        ctx.scroll_to_bottom(&list).await.unwrap();
        ctx.scroll_to_bottom(&list).await.unwrap();
        ctx.scroll_to_bottom(&list).await.unwrap();
        assert_eq!(ctx.count("div[data-review-id]").await.unwrap(), 25);
    }
}
