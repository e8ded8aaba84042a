use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Well-known install locations probed when neither the config nor the
/// CHROME_PATH environment variable points at a browser binary.
const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Runs before any page script. Hides the usual automation tells: the
/// webdriver flag, the empty plugin list, the missing languages array and
/// the permissions API rejecting queries outright.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) =>
    originalQuery
        ? originalQuery.call(window.navigator.permissions, parameters)
        : Promise.resolve({ state: 'granted' });
"#;

/// Viewport/user-agent pairing for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabProfile {
    Desktop,
    Mobile,
}

/// One launched rendering engine, shared by every rendered source in a run.
pub struct HeadlessBrowser {
    browser: Browser,
    config: ScraperConfig,
}

impl HeadlessBrowser {
    pub fn launch(config: &ScraperConfig) -> Result<Self> {
        let chrome_path = locate_chrome(config)?;
        debug!("Launching browser from {}", chrome_path.display());

        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some((1366, 768)))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-background-timer-throttling"),
                OsStr::new("--disable-backgrounding-occluded-windows"),
                OsStr::new("--disable-renderer-backgrounding"),
                OsStr::new("--disable-gpu"),
            ])
            .build()
            .map_err(|e| AppError::BrowserLaunch(format!("invalid launch options: {e}")))?;
        launch_options.path = Some(chrome_path);

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::BrowserLaunch(e.to_string()))?;

        Ok(Self {
            browser,
            config: config.clone(),
        })
    }

    /// Open an isolated tab with the anti-automation countermeasures applied
    /// and a profile-appropriate user agent set.
    pub fn open_tab(&self, profile: TabProfile) -> Result<PageHandle> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| AppError::BrowserLaunch(format!("failed to open tab: {e}")))?;

        tab.set_default_timeout(Duration::from_secs(self.config.request_timeout));

        let user_agent = match profile {
            TabProfile::Desktop => &self.config.user_agent,
            TabProfile::Mobile => &self.config.mobile_user_agent,
        };
        tab.set_user_agent(user_agent, Some("en-US,en;q=0.9"), None)
            .map_err(|e| AppError::BrowserLaunch(format!("failed to set user agent: {e}")))?;

        if let Err(e) = tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: STEALTH_SCRIPT.to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        }) {
            // Detection-sensitive sources may still work without it.
            warn!("Could not install stealth script: {}", e);
        }

        Ok(PageHandle {
            tab,
            element_timeout: Duration::from_millis(self.config.element_timeout_ms),
            settle_delay: Duration::from_millis(self.config.settle_delay_ms),
        })
    }
}

/// A live, interactive page. Reads go through `content()` + the `scraper`
/// crate; interactions go through small script snippets so the extraction
/// logic itself stays unit-testable against captured HTML.
pub struct PageHandle {
    tab: Arc<Tab>,
    element_timeout: Duration,
    settle_delay: Duration,
}

impl PageHandle {
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.tab.navigate_to(url).map_err(|e| AppError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub fn content(&self) -> Result<String> {
        self.tab
            .get_content()
            .map_err(|e| AppError::Extraction(format!("failed to read page content: {e}")))
    }

    /// Wait for an element within the configured element timeout. A missing
    /// element is an answer, not an error.
    pub fn wait_for(&self, selector: &str) -> bool {
        self.tab
            .wait_for_element_with_custom_timeout(selector, self.element_timeout)
            .is_ok()
    }

    /// The settle delay: a fixed pause after a UI action so asynchronous
    /// content can finish loading before the next read.
    pub async fn settle(&self) {
        tokio::time::sleep(self.settle_delay).await;
    }

    /// Run a script expected to return a boolean. Anything else, including
    /// evaluation failure, reads as `false`.
    pub fn eval_bool(&self, js: &str) -> bool {
        matches!(
            self.tab.evaluate(js, false).ok().and_then(|r| r.value),
            Some(serde_json::Value::Bool(true))
        )
    }

    /// Run a script that returns `JSON.stringify(...)` output and parse it.
    pub fn eval_json(&self, js: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(js, false)
            .map_err(|e| AppError::Extraction(format!("script evaluation failed: {e}")))?;
        match result.value {
            Some(serde_json::Value::String(s)) => Ok(serde_json::from_str(&s)?),
            Some(value) => Ok(value),
            None => Ok(serde_json::Value::Null),
        }
    }

    /// Click the first visible match for `selector`. Returns whether a click
    /// happened.
    pub fn try_click(&self, selector: &str) -> bool {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (el && el.offsetParent !== null) {{ el.click(); return true; }}
                return false;
            }})()"#,
            js_string(selector)
        );
        self.eval_bool(&js)
    }

    /// Scroll to the bottom `times` times, settling between scrolls, to
    /// trigger lazy-loaded content.
    pub async fn scroll_to_bottom(&self, times: u32) {
        for _ in 0..times {
            let _ = self
                .tab
                .evaluate("window.scrollTo(0, document.body.scrollHeight)", false);
            self.settle().await;
        }
    }

    pub fn close(self) {
        let _ = self.tab.close(true);
    }
}

/// Escape a value for interpolation inside a single-quoted JS string.
pub(crate) fn js_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn locate_chrome(config: &ScraperConfig) -> Result<PathBuf> {
    if let Some(configured) = &config.chrome_path {
        let path = PathBuf::from(configured);
        if path.exists() {
            return Ok(path);
        }
        warn!("Configured chrome_path {} does not exist, probing defaults", configured);
    }

    for candidate in CHROME_CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(AppError::BrowserLaunch(
        "no Chrome or Chromium binary found; set scraper.chrome_path or CHROME_PATH".to_string(),
    ))
}
