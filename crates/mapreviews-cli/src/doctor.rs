// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use mapreviews::config::{BrowserConfig, MIN_JOB_DELAY_SECS};
use mapreviews::renderer::chromium::find_chromium;
use mapreviews::ScrapeConfig;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Ok(String),
    Warn(String),
    Fail(String),
}

impl Check {
    fn line(&self) -> String {
        match self {
            Check::Ok(m) => format!("[OK] {m}"),
            Check::Warn(m) => format!("[??] {m}"),
            Check::Fail(m) => format!("[!!] {m}"),
        }
    }
}

/// Where the browser would be launched from: the configured path when it
/// exists, otherwise discovery.
fn browser_binary(config: &BrowserConfig) -> Result<PathBuf, String> {
    match config.executable {
        Some(ref path) if path.exists() => Ok(path.clone()),
        Some(ref path) => Err(format!("configured Chromium does not exist: {}", path.display())),
        None => find_chromium().ok_or_else(|| {
            "Chromium NOT found. Install Chrome or set MAPREVIEWS_CHROME.".to_string()
        }),
    }
}

pub fn checks(config: &ScrapeConfig) -> Vec<Check> {
    let mut out = Vec::new();

    match browser_binary(&config.browser) {
        Ok(path) => out.push(Check::Ok(format!("Chromium found: {}", path.display()))),
        Err(msg) => out.push(Check::Fail(msg)),
    }

    match config.browser.profile_dir {
        Some(ref dir) if dir.is_dir() => {
            out.push(Check::Ok(format!("Profile directory: {}", dir.display())))
        }
        Some(ref dir) => out.push(Check::Warn(format!(
            "Profile directory will be created: {}",
            dir.display()
        ))),
        None => out.push(Check::Ok("Profile: temporary".to_string())),
    }

    out.push(Check::Ok(format!(
        "Locale: {} (hl={})",
        config.browser.locale, config.resolver.language
    )));

    let delay = config.batch.min_delay().as_secs();
    if delay < MIN_JOB_DELAY_SECS {
        out.push(Check::Warn(format!(
            "Delay between places is {delay}s (below {MIN_JOB_DELAY_SECS}s)"
        )));
    } else {
        out.push(Check::Ok(format!("Delay between places: {delay}s")));
    }

    out
}

pub fn is_ready(checks: &[Check]) -> bool {
    !checks.iter().any(|c| matches!(c, Check::Fail(_)))
}

/// Print the report. Returns whether the environment is usable.
pub fn run(config: &ScrapeConfig) -> bool {
    println!("mapreviews doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let checks = checks(config);
    for check in &checks {
        println!("{}", check.line());
    }

    println!();
    let ready = is_ready(&checks);
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configured_binary_is_not_ready() {
        let mut config = ScrapeConfig::default();
        config.browser.executable = Some(PathBuf::from("/nonexistent/chrome"));
        let checks = checks(&config);
        assert!(matches!(checks[0], Check::Fail(ref m) if m.contains("/nonexistent/chrome")));
        assert!(!is_ready(&checks));
    }

    #[test]
    fn test_existing_configured_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("chrome");
        std::fs::write(&bin, b"").unwrap();

        let mut config = ScrapeConfig::default();
        config.browser.executable = Some(bin);
        config.browser.profile_dir = Some(dir.path().to_path_buf());
        config.batch.min_delay_secs = 2;
        config.batch.allow_short_delay = true;

        let checks = checks(&config);
        assert!(is_ready(&checks));
        assert!(matches!(checks[1], Check::Ok(ref m) if m.starts_with("Profile directory")));
        assert!(matches!(checks[3], Check::Warn(_)));
    }
}
