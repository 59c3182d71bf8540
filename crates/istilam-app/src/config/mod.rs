//! Configuration loading and defaults.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use istilam_server::ServerConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::extract::ClassifierConfig;

const CONFIG_FILE: &str = "config/settings";

const DEFAULT_PORTAL_URL: &str = "https://www.moi.gov.kw/main/eservices/gdt/violation-enquiry";

// The portal serves a degraded page to unrecognized clients; present a
// mainstream desktop profile by default.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/97.0.4692.71 Safari/537.36";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub portal: PortalConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PortalConfig {
    pub url: String,
    pub user_agent: String,
    /// Navigation timeout; the portal is slow on a good day.
    pub nav_timeout_secs: u64,
    /// Delay after the enquiry page loads, before reading the form.
    pub settle_ms: u64,
    /// Delay after submitting, before reading results.
    pub results_settle_ms: u64,
    /// Directory for diagnostic screenshots; `None` disables them.
    pub screenshot_dir: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nav_timeout_secs: 60,
            settle_ms: 2000,
            results_settle_ms: 3000,
            screenshot_dir: Some(default_screenshot_dir()),
            headless: true,
            sandbox: false,
        }
    }
}

/// Defaults → optional `config/settings` file → `ISTILAM`-prefixed
/// environment variables (`ISTILAM_PORTAL__URL=...`).
pub fn load() -> Result<AppConfig, AppConfigError> {
    let cfg = Config::builder()
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(Environment::with_prefix("ISTILAM").separator("__"))
        .build()?
        .try_deserialize()?;
    Ok(cfg)
}

fn default_screenshot_dir() -> PathBuf {
    ProjectDirs::from("dev", "istilam", "istilam")
        .map(|dirs| dirs.cache_dir().join("screenshots"))
        .unwrap_or_else(|| std::env::temp_dir().join("istilam-screenshots"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_portal() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.portal.url, DEFAULT_PORTAL_URL);
        assert!(cfg.portal.headless);
        assert_eq!(cfg.portal.nav_timeout_secs, 60);
        assert!(cfg.portal.screenshot_dir.is_some());
    }

    #[test]
    fn settle_delays_cover_slow_postbacks() {
        let cfg = PortalConfig::default();
        assert!(cfg.results_settle_ms >= cfg.settle_ms);
    }
}
