// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration: defaults, optional JSON file, environment overrides.
//!
//! Nothing below the orchestrator reads the environment; every tunable the
//! navigator, loader and rate limiter use arrives through [`ScrapeConfig`].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lower bound on the pause between jobs.
pub const MIN_JOB_DELAY_SECS: u64 = 20;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub browser: BrowserConfig,
    pub navigation: NavigationConfig,
    pub loader: LoaderConfig,
    pub batch: BatchConfig,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chromium binary. Discovered when unset.
    pub executable: Option<PathBuf>,
    /// User-data directory for the browser profile.
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: String,
    /// BCP 47 locale, e.g. `ja-JP`.
    pub locale: String,
    pub disable_images: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            profile_dir: None,
            headless: true,
            window_size: (1280, 720),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            locale: "ja-JP".to_string(),
            disable_images: true,
        }
    }
}

impl BrowserConfig {
    /// `Accept-Language` value derived from the locale (`ja-JP` → `ja-JP,ja`).
    pub fn accept_language(&self) -> String {
        match self.locale.split_once('-') {
            Some((lang, _)) => format!("{},{}", self.locale, lang),
            None => self.locale.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub timeout_ms: u64,
    /// Pause after load before touching the page.
    pub settle_ms: u64,
    /// How long layout detection may poll for tabs to render.
    pub detect_timeout_ms: u64,
    pub detect_poll_ms: u64,
    /// Pause after clicks that re-render the panel (tab, sort, search hop).
    pub click_settle_ms: u64,
    /// Extra navigations allowed when the reviews tab cannot be selected.
    pub tab_retries: u32,
    pub sort_newest: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            settle_ms: 4_000,
            detect_timeout_ms: 10_000,
            detect_poll_ms: 500,
            click_settle_ms: 3_000,
            tab_retries: 2,
            sort_newest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub max_attempts: u32,
    /// Consecutive no-growth attempts that end loading.
    pub stall_limit: u32,
    /// Pause after the jump to the bottom of the list.
    pub settle_ms: u64,
    pub step_count: u32,
    pub step_px: i64,
    pub step_pause_ms: u64,
    /// Pause after the incremental steps, before re-counting.
    pub post_steps_ms: u64,
    pub attempt_timeout_ms: u64,
    /// Random extra delay added to the settle pause.
    pub jitter_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            stall_limit: 2,
            settle_ms: 1_500,
            step_count: 5,
            step_px: 800,
            step_pause_ms: 300,
            post_steps_ms: 2_000,
            attempt_timeout_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub min_delay_secs: u64,
    /// Permit delays below [`MIN_JOB_DELAY_SECS`]. Local fixtures only.
    pub allow_short_delay: bool,
    pub default_count: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: MIN_JOB_DELAY_SECS,
            allow_short_delay: false,
            default_count: 50,
        }
    }
}

impl BatchConfig {
    pub fn min_delay(&self) -> Duration {
        let secs = if self.allow_short_delay {
            self.min_delay_secs
        } else {
            self.min_delay_secs.max(MIN_JOB_DELAY_SECS)
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Value of the `hl` query parameter on resolved URLs.
    pub language: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            language: "ja".to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Defaults, then `explicit` or `MAPREVIEWS_CONFIG`, then env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("MAPREVIEWS_CONFIG").map(PathBuf::from));

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MAPREVIEWS_*` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAPREVIEWS_CHROME") {
            self.browser.executable = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MAPREVIEWS_PROFILE_DIR") {
            self.browser.profile_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MAPREVIEWS_LOCALE") {
            self.browser.locale = v;
        }
        if let Some(v) = lookup("MAPREVIEWS_NAV_TIMEOUT_MS") {
            self.navigation.timeout_ms = parse_env("MAPREVIEWS_NAV_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("MAPREVIEWS_MAX_ATTEMPTS") {
            self.loader.max_attempts = parse_env("MAPREVIEWS_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("MAPREVIEWS_MIN_DELAY_SECS") {
            self.batch.min_delay_secs = parse_env("MAPREVIEWS_MIN_DELAY_SECS", &v)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = ScrapeConfig::default();
        assert_eq!(c.loader.stall_limit, 2);
        assert_eq!(c.batch.min_delay(), Duration::from_secs(20));
        assert_eq!(c.resolver.language, "ja");
        assert_eq!(c.browser.accept_language(), "ja-JP,ja");
    }

    #[test]
    fn test_min_delay_floor() {
        let mut b = BatchConfig {
            min_delay_secs: 3,
            ..BatchConfig::default()
        };
        assert_eq!(b.min_delay(), Duration::from_secs(20));
        b.allow_short_delay = true;
        assert_eq!(b.min_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, r#"{{ "loader": {{ "max_attempts": 7 }}, "browser": {{ "locale": "en-US" }} }}"#)
            .unwrap();

        let c = ScrapeConfig::from_file(&path).unwrap();
        assert_eq!(c.loader.max_attempts, 7);
        assert_eq!(c.loader.stall_limit, 2);
        assert_eq!(c.browser.locale, "en-US");
        assert!(c.browser.headless);
    }

    #[test]
    fn test_bad_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ScrapeConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MAPREVIEWS_CHROME", "/opt/chrome"),
            ("MAPREVIEWS_MAX_ATTEMPTS", "12"),
            ("MAPREVIEWS_MIN_DELAY_SECS", "45"),
        ]);
        let mut c = ScrapeConfig::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.browser.executable, Some(PathBuf::from("/opt/chrome")));
        assert_eq!(c.loader.max_attempts, 12);
        assert_eq!(c.batch.min_delay(), Duration::from_secs(45));
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut c = ScrapeConfig::default();
        let err = c
            .apply_env(|k| (k == "MAPREVIEWS_NAV_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }
}
