// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! The browser session a batch runs on.
//!
//! A session is one browser context with the automation fingerprint already
//! masked. It is acquired once per batch and released on every exit path.

use crate::config::BrowserConfig;
use crate::renderer::{RenderContext, Renderer};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

pub struct BrowserSession {
    context: Box<dyn RenderContext>,
    created_at: Instant,
    navigations: u32,
}

impl BrowserSession {
    /// Open a context and apply the identity overrides before any page load.
    pub async fn acquire(renderer: &dyn Renderer, config: &BrowserConfig) -> Result<Self> {
        let context = renderer
            .new_context()
            .await
            .context("failed to open browser context")?;

        if let Err(e) = apply_fingerprint(context.as_ref(), config).await {
            let _ = context.close().await;
            return Err(e);
        }

        tracing::debug!(locale = %config.locale, "browser session acquired");
        Ok(Self {
            context,
            created_at: Instant::now(),
            navigations: 0,
        })
    }

    pub fn context(&self) -> &dyn RenderContext {
        self.context.as_ref()
    }

    /// Mutable access for a navigation.
    pub fn navigate_context(&mut self) -> &mut dyn RenderContext {
        self.navigations += 1;
        self.context.as_mut()
    }

    pub fn navigations(&self) -> u32 {
        self.navigations
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Close the context. Errors are logged, not returned.
    pub async fn release(self) {
        tracing::debug!(
            navigations = self.navigations,
            age_secs = self.age().as_secs(),
            "releasing browser session"
        );
        if let Err(e) = self.context.close().await {
            tracing::warn!("closing browser context failed: {e:#}");
        }
    }
}

async fn apply_fingerprint(ctx: &dyn RenderContext, config: &BrowserConfig) -> Result<()> {
    ctx.suppress_automation_signature().await?;
    ctx.set_user_agent(&config.user_agent, &config.accept_language())
        .await?;
    ctx.set_locale(&config.locale).await?;
    Ok(())
}
