//! Browser-automation collaborator for the MOI portal.
//!
//! Owns everything that touches a live page: navigation, form filling,
//! screenshots, and reading rendered content. One browser process per query,
//! closed when the `PortalBrowser` drops, on every exit path.

pub mod harvest;

use std::{ffi::OsStr, fs, path::PathBuf, sync::Arc, thread, time::Duration};

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use thiserror::Error;

use crate::config::PortalConfig;
use crate::extract::{ElementDescriptor, PageSnapshot};

// Desktop viewport; the portal hides the enquiry form on narrow layouts.
const PAGE_WIDTH: u32 = 1366;
const PAGE_HEIGHT: u32 = 768;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {source}")]
    Launch {
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to open a page handle: {source}")]
    OpenTab {
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to navigate to `{url}`: {source}")]
    Navigate {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to read page content: {source}")]
    Content {
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to fill `{selector}`: {source}")]
    Fill {
        selector: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to click `{selector}`: {source}")]
    Click {
        selector: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BrowserError {
    /// Stage label for logs and the collaborator-failure envelope.
    pub fn stage(&self) -> &'static str {
        match self {
            BrowserError::Launch { .. } => "launch",
            BrowserError::OpenTab { .. } => "open-tab",
            BrowserError::Navigate { .. } => "navigate",
            BrowserError::Content { .. } => "content",
            BrowserError::Fill { .. } => "fill",
            BrowserError::Click { .. } => "click",
        }
    }
}

pub struct PortalBrowser {
    // Held so the browser process outlives the tab; closed on drop.
    _browser: Browser,
    tab: Arc<Tab>,
    url: String,
    settle: Duration,
    results_settle: Duration,
    screenshot_dir: Option<PathBuf>,
}

impl PortalBrowser {
    pub fn launch(config: &PortalConfig) -> Result<Self, BrowserError> {
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-features=IsolateOrigins"),
            OsStr::new("--disable-site-isolation-trials"),
        ];
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(config.sandbox)
            .window_size(Some((PAGE_WIDTH, PAGE_HEIGHT)))
            .args(args)
            .idle_browser_timeout(Duration::from_secs(config.nav_timeout_secs))
            .build()
            .map_err(|error| BrowserError::Launch {
                source: anyhow::anyhow!(error),
            })?;

        let browser = Browser::new(options).map_err(|source| BrowserError::Launch { source })?;
        let tab = browser
            .new_tab()
            .map_err(|source| BrowserError::OpenTab { source })?;
        tab.set_default_timeout(Duration::from_secs(config.nav_timeout_secs));
        if let Err(error) = tab.set_user_agent(&config.user_agent, None, None) {
            tracing::warn!(%error, "failed to override user agent; continuing with default");
        }
        tracing::debug!(headless = config.headless, "browser launched");

        Ok(Self {
            _browser: browser,
            tab,
            url: config.url.clone(),
            settle: Duration::from_millis(config.settle_ms),
            results_settle: Duration::from_millis(config.results_settle_ms),
            screenshot_dir: config.screenshot_dir.clone(),
        })
    }

    /// Navigates to the enquiry page and waits for it to settle.
    pub fn open_enquiry_page(&self) -> Result<(), BrowserError> {
        tracing::info!(url = %self.url, "navigating to enquiry page");
        self.tab
            .navigate_to(&self.url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|source| BrowserError::Navigate {
                url: self.url.clone(),
                source,
            })?;
        thread::sleep(self.settle);
        self.screenshot("initial-page");
        Ok(())
    }

    /// Reads all input/button elements once; descriptors are immutable from
    /// here on.
    pub fn element_inventory(&self) -> Result<Vec<ElementDescriptor>, BrowserError> {
        let html = self.content()?;
        let inventory = harvest::element_inventory(&html);
        tracing::debug!(elements = inventory.len(), "collected form element inventory");
        Ok(inventory)
    }

    pub fn fill_input(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.tab
            .find_element(selector)
            .and_then(|element| element.type_into(value).map(|_| ()))
            .map_err(|source| BrowserError::Fill {
                selector: selector.to_string(),
                source,
            })
    }

    /// Clicks the submit control and waits for results. A failed navigation
    /// wait is expected for same-page postbacks and only logged.
    pub fn click_submit(&self, selector: &str) -> Result<(), BrowserError> {
        self.tab
            .find_element(selector)
            .and_then(|element| element.click().map(|_| ()))
            .map_err(|source| BrowserError::Click {
                selector: selector.to_string(),
                source,
            })?;
        if let Err(error) = self.tab.wait_until_navigated() {
            tracing::debug!(%error, "no navigation after submit; assuming in-page results");
        }
        thread::sleep(self.results_settle);
        self.screenshot("results-page");
        Ok(())
    }

    pub fn snapshot(&self) -> Result<PageSnapshot, BrowserError> {
        let html = self.content()?;
        Ok(harvest::page_snapshot(&html))
    }

    /// Diagnostic screenshot, best effort: an operational aid, never part of
    /// the data contract and never fatal.
    pub fn screenshot(&self, stage: &str) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };
        let result = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|error| error.to_string())
            .and_then(|png| {
                fs::create_dir_all(dir).map_err(|error| error.to_string())?;
                fs::write(dir.join(format!("{stage}.png")), png)
                    .map_err(|error| error.to_string())
            });
        match result {
            Ok(()) => tracing::debug!(stage, "screenshot written"),
            Err(error) => tracing::warn!(stage, %error, "failed to write screenshot"),
        }
    }

    fn content(&self) -> Result<String, BrowserError> {
        self.tab
            .get_content()
            .map_err(|source| BrowserError::Content { source })
    }
}
