// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{script, NavigationResult, NavigationTimeout, RenderContext, Renderer};
use crate::config::BrowserConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. Explicit env
    for key in ["MAPREVIEWS_CHROME", "CHROME_BIN"] {
        if let Ok(p) = std::env::var(key) {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }
    }

    // 2. Browser downloaded into the cache dir
    if let Some(cache) = dirs::cache_dir() {
        let root = cache.join("mapreviews/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                root.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            ]
        } else {
            vec![root.join("chrome-linux64/chrome"), root.join("chrome")]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch Chromium with the locale, window and profile from `config`.
    pub async fn new(config: &BrowserConfig) -> Result<Self> {
        let chrome_path = match config.executable {
            Some(ref p) => p.clone(),
            None => find_chromium()
                .context("Chromium not found. Set MAPREVIEWS_CHROME or install Google Chrome.")?,
        };

        let (width, height) = config.window_size;
        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height)
            .request_timeout(Duration::from_secs(60))
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--lang={}", config.locale));

        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if config.disable_images {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }
        if let Some(ref dir) = config.profile_dir {
            builder = builder.user_data_dir(dir);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler: {e}");
                }
            }
        });

        tracing::info!(locale = %config.locale, headless = config.headless, "Chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!("browser close failed: {e}");
        }
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => Err(NavigationTimeout { timeout_ms }.into()),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn suppress_automation_signature(&self) -> Result<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                script::HIDE_WEBDRIVER,
            ))
            .await
            .context("failed to inject automation mask")?;
        Ok(())
    }

    async fn set_user_agent(&self, user_agent: &str, accept_language: &str) -> Result<()> {
        let mut params = SetUserAgentOverrideParams::new(user_agent);
        params.accept_language = Some(accept_language.to_string());
        self.page
            .execute(params)
            .await
            .context("failed to override user agent")?;
        Ok(())
    }

    async fn set_locale(&self, locale: &str) -> Result<()> {
        self.page
            .execute(SetLocaleOverrideParams {
                locale: Some(locale.to_string()),
            })
            .await
            .context("failed to override locale")?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{ElementRef, Requirement};

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_dom_operations() {
        let renderer = ChromiumRenderer::new(&BrowserConfig::default())
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");
        ctx.suppress_automation_signature().await.unwrap();

        let page = "data:text/html,<h1>Hello</h1>\
            <div id='list' style='height:50px;overflow:auto'>\
            <div data-review-id='a' style='height:40px'>A</div>\
            <div data-review-id='b' style='height:40px'>B</div></div>";
        let nav = ctx.navigate(page, 10000).await.expect("navigation failed");
        assert!(nav.load_time_ms < 10000);

        assert_eq!(ctx.count("[data-review-id]").await.unwrap(), 2);
        assert_eq!(
            ctx.text_of("h1").await.unwrap().as_deref(),
            Some("Hello")
        );
        assert_eq!(ctx.text_of("h2").await.unwrap(), None);
        assert_eq!(
            ctx.find_element("#list", Requirement::Scrollable, None)
                .await
                .unwrap(),
            Some(0)
        );
        let list = ElementRef::new("#list", 0);
        assert!(ctx.scroll_to_bottom(&list).await.unwrap());
        assert_eq!(
            ctx.outer_html_all("[data-review-id]").await.unwrap().len(),
            2
        );

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.expect("shutdown failed");
    }
}
