// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the extraction engine.
//!
//! Resolution and navigation failures are fatal to a single job only. Parse
//! skips never leave the parser; they are counted and dropped. Every job-level
//! error carries a stable machine reason via [`ScrapeError::reason`].

/// Failure to turn a target into a navigable URL.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("empty input")]
    EmptyInput,

    #[error("cannot decode place id from \"{token}\"")]
    CidParse { token: String },

    #[error("invalid URL \"{input}\": {reason}")]
    InvalidUrl { input: String, reason: String },
}

impl ResolutionError {
    pub fn reason(&self) -> &'static str {
        match self {
            ResolutionError::EmptyInput => "empty-input",
            ResolutionError::CidParse { .. } => "cid-parse",
            ResolutionError::InvalidUrl { .. } => "invalid-url",
        }
    }
}

/// Failure while driving the browser to a place page.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// The page advertises reviews but no selection strategy found a
    /// visible, clickable reviews tab.
    #[error("reviews tab not found")]
    TabNotFound,

    /// No tabs rendered at all before detection gave up, so the layout
    /// could not be told apart. Reported as a missing tab.
    #[error("reviews tab not found (layout-unknown: no tabs rendered within {timeout_ms}ms)")]
    LayoutUnknown { timeout_ms: u64 },

    #[error("navigation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("cancelled")]
    Cancelled,
}

impl NavigationError {
    pub fn reason(&self) -> &'static str {
        match self {
            NavigationError::TabNotFound | NavigationError::LayoutUnknown { .. } => {
                "tab-not-found"
            }
            NavigationError::Timeout { .. } => "timeout",
            NavigationError::Browser(_) => "browser",
            NavigationError::Cancelled => "cancelled",
        }
    }

    /// Only a missing tab is worth another navigation.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            NavigationError::TabNotFound | NavigationError::LayoutUnknown { .. }
        )
    }
}

/// Job-level failure. Absorbed by the orchestrator into `failed(reason)`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("loader attempt {attempt} timed out after {timeout_ms}ms")]
    LoaderTimeout { attempt: u32, timeout_ms: u64 },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn reason(&self) -> &'static str {
        match self {
            ScrapeError::Resolution(e) => e.reason(),
            ScrapeError::Navigation(e) => e.reason(),
            ScrapeError::LoaderTimeout { .. } => "loader-timeout",
            ScrapeError::Browser(_) => "browser",
            ScrapeError::Cancelled => "cancelled",
        }
    }

    pub(crate) fn browser(err: anyhow::Error) -> Self {
        ScrapeError::Browser(format!("{err:#}"))
    }
}

/// Why a single review node was dropped.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseSkip {
    #[error("node has no review element")]
    NoReviewElement,

    #[error("review id attribute missing or empty")]
    MissingId,
}

/// Configuration loading failure.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: \"{value}\"")]
    InvalidEnv { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons_are_stable() {
        assert_eq!(ResolutionError::EmptyInput.reason(), "empty-input");
        assert_eq!(
            ScrapeError::from(ResolutionError::CidParse {
                token: "0xZZ".into()
            })
            .reason(),
            "cid-parse"
        );
        assert_eq!(
            ScrapeError::from(NavigationError::TabNotFound).reason(),
            "tab-not-found"
        );
        let unknown = ScrapeError::from(NavigationError::LayoutUnknown { timeout_ms: 10 });
        assert_eq!(unknown.reason(), "tab-not-found");
        assert!(unknown.to_string().contains("layout-unknown"));
        assert_eq!(
            ScrapeError::from(NavigationError::Timeout { timeout_ms: 10 }).reason(),
            "timeout"
        );
        assert_eq!(
            ScrapeError::LoaderTimeout {
                attempt: 3,
                timeout_ms: 5
            }
            .reason(),
            "loader-timeout"
        );
    }

    #[test]
    fn test_only_tab_not_found_retries() {
        assert!(NavigationError::TabNotFound.is_retriable());
        assert!(NavigationError::LayoutUnknown { timeout_ms: 1 }.is_retriable());
        assert!(!NavigationError::Timeout { timeout_ms: 1 }.is_retriable());
        assert!(!NavigationError::Browser("x".into()).is_retriable());
        assert!(!NavigationError::Cancelled.is_retriable());
    }
}
