// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! mapreviews: extraction engine for Google Maps place reviews.
//!
//! The pipeline for one target is
//! resolver → navigator → loader → parser → collector, driven by the
//! [`Orchestrator`] over a single browser session per batch.

#![allow(clippy::new_without_default)]

pub mod cancel;
pub mod collector;
pub mod config;
pub mod error;
pub mod loader;
pub mod locator;
pub mod navigator;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod rate_limit;
pub mod renderer;
pub mod resolver;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::ScrapeConfig;
pub use error::{ConfigError, NavigationError, ParseSkip, ResolutionError, ScrapeError};
pub use orchestrator::Orchestrator;
pub use types::{
    BatchJob, BatchSummary, JobResult, JobStatus, LoadStop, PageMode, PlaceSummary,
    ResolvedPlace, ReviewRecord, ScrapeJob, TargetSpec,
};
