// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-driven page access.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The DOM
//! operations the navigator and loader need have default implementations on
//! top of `execute_js`, so a new engine only has to provide the primitives.

pub mod chromium;
pub mod script;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Returned (inside `anyhow::Error`) when a page load exceeds its timeout.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("navigation timed out after {timeout_ms}ms")]
pub struct NavigationTimeout {
    pub timeout_ms: u64,
}

/// What an element must satisfy to count as found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    Present,
    /// Rendered with a non-zero box.
    Visible,
    /// Content taller than its viewport.
    Scrollable,
}

/// A live element addressed by selector and match index.
///
/// Only valid until the next re-render. Callers re-locate rather than hold
/// these across navigations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
}

impl ElementRef {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Hide `navigator.webdriver` from every document loaded afterwards.
    async fn suppress_automation_signature(&self) -> Result<()>;
    /// Override the user agent and `Accept-Language` header.
    async fn set_user_agent(&self, user_agent: &str, accept_language: &str) -> Result<()>;
    /// Override the locale reported to pages.
    async fn set_locale(&self, locale: &str) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;

    /// Evaluate `expr` and decode its JSON-serialized value.
    async fn eval_json(&self, expr: &str) -> Result<serde_json::Value> {
        let raw = self.execute_js(&script::json_wrapped(expr)).await?;
        let text = raw.as_str().context("script did not return a string")?;
        serde_json::from_str(text).context("script returned invalid JSON")
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let v = self.eval_json(&script::count(selector)).await?;
        Ok(v.as_u64().unwrap_or(0) as usize)
    }

    /// Index of the first match that satisfies `require` and, when given,
    /// mentions `text` in its text or aria-label.
    async fn find_element(
        &self,
        selector: &str,
        require: Requirement,
        text: Option<&str>,
    ) -> Result<Option<usize>> {
        let v = self
            .eval_json(&script::find(selector, require, text))
            .await?;
        Ok(v.as_i64().filter(|i| *i >= 0).map(|i| i as usize))
    }

    /// Returns false when the element no longer exists.
    async fn click(&self, el: &ElementRef) -> Result<bool> {
        let v = self.eval_json(&script::click(el)).await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn scroll_to_bottom(&self, el: &ElementRef) -> Result<bool> {
        let v = self.eval_json(&script::scroll_to_bottom(el)).await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn scroll_by(&self, el: &ElementRef, delta: i64) -> Result<bool> {
        let v = self.eval_json(&script::scroll_by(el, delta)).await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn outer_html_all(&self, selector: &str) -> Result<Vec<String>> {
        let v = self.eval_json(&script::outer_html_all(selector)).await?;
        serde_json::from_value(v).context("unexpected outerHTML list")
    }

    /// Trimmed text content of the first match.
    async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        let v = self.eval_json(&script::text_of(selector)).await?;
        Ok(v.as_str().map(str::to_string))
    }

    async fn attribute_of(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let v = self
            .eval_json(&script::attribute_of(selector, attribute))
            .await?;
        Ok(v.as_str().map(str::to_string))
    }

    /// Click every `buttons` match inside `scope` matches. Returns the number
    /// of clicks.
    async fn expand_truncated(&self, scope: &str, buttons: &str) -> Result<usize> {
        let v = self
            .eval_json(&script::expand_truncated(scope, buttons))
            .await?;
        Ok(v.as_u64().unwrap_or(0) as usize)
    }
}
