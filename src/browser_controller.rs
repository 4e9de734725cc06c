use anyhow::{anyhow, Context, Result};
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use reqwest::Url;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::types::{RenderError, RenderedPage};

/// Capability to load a URL, wait until the document is ready and hand back its DOM.
///
/// Implementations own whatever process they start and must release it before
/// `render` returns, on success and on failure alike.
pub trait Renderer: Send + Sync {
    fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError>;
}

/// Renders pages in a fresh headless Chrome per call.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    window_size: (u32, u32),
    sandbox: bool,
}

impl ChromeRenderer {
    pub fn new(window_size: (u32, u32), sandbox: bool) -> Self {
        ChromeRenderer {
            window_size,
            sandbox,
        }
    }
}

impl Renderer for ChromeRenderer {
    fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        // the controller is dropped, and chrome killed, on every path out of this scope
        let browser = BrowserController::new(self.window_size, self.sandbox, timeout)
            .map_err(|e| RenderError::Launch(format!("{:#}", e)))?;
        let tab = browser.browse(url.as_str(), timeout)?;
        let html = tab.get_content().map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            reason: format!("could not read document: {}", e),
        })?;
        Ok(RenderedPage {
            url: landed_url(url, &tab.get_url()),
            html,
        })
    }
}

/// The URL the tab ended up on after redirects, or the requested one if chrome
/// reports something unusable (e.g. `about:blank`).
fn landed_url(requested: &Url, reported: &str) -> Url {
    match Url::parse(reported) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u,
        _ => {
            debug!("tab reported {:?}, keeping {}", reported, requested);
            requested.clone()
        }
    }
}

/// A single budget shared by every wait of one page load.
struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn new(timeout: Duration) -> Self {
        Deadline {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    fn timeout_error(&self, url: &str) -> RenderError {
        RenderError::Timeout {
            url: url.into(),
            secs: self.timeout.as_secs(),
        }
    }
}

pub struct BrowserController {
    browser: Browser,
}

impl BrowserController {
    pub fn new(window_size: (u32, u32), sandbox: bool, timeout: Duration) -> Result<Self> {
        let path = default_executable().map_err(|e| anyhow!(e))?;
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .window_size(Some(window_size))
            .idle_browser_timeout(timeout + Duration::from_secs(30))
            // warning only disable this if in docker env
            .sandbox(sandbox)
            .build()
            .map_err(|e| anyhow!(e.to_string()))
            .context("couldn't find appropriate Chrome binary")?;
        let browser = Browser::new(options).context("browser launching error")?;

        Ok(BrowserController { browser })
    }

    /// Navigates a new tab to `url` and waits for a `<body>` to be present, both
    /// within the same `timeout`.
    pub fn browse(&self, url: &str, timeout: Duration) -> Result<Arc<Tab>, RenderError> {
        let deadline = Deadline::new(timeout);
        let tab = self.browser.new_tab().map_err(|e| RenderError::Navigation {
            url: url.into(),
            reason: format!("could not create new tab: {}", e),
        })?;
        tab.set_default_timeout(deadline.remaining());

        debug!("navigating to {}", url);
        if let Err(e) = tab.navigate_to(url).and_then(|t| t.wait_until_navigated()) {
            if deadline.expired() {
                warn!("{} did not finish loading in time: {}", url, e);
                return Err(deadline.timeout_error(url));
            }
            error!("could not navigate to {} with error {}", url, e);
            return Err(RenderError::Navigation {
                url: url.into(),
                reason: e.to_string(),
            });
        }

        if deadline.expired() {
            return Err(deadline.timeout_error(url));
        }
        if let Err(e) = tab.wait_for_element_with_custom_timeout("body", deadline.remaining()) {
            warn!("{} never reached a ready state: {}", url, e);
            return Err(deadline.timeout_error(url));
        }
        debug!("{} is ready", tab.get_url());

        Ok(tab)
    }

    pub fn process_id(&self) -> Option<u32> {
        self.browser.get_process_id()
    }

    pub fn kill(&self) -> bool {
        let pid = match self.process_id() {
            Some(pid) => Pid::from_u32(pid),
            None => return false,
        };
        let mut s = System::new();
        if !s.refresh_process(pid) {
            return false;
        }
        if let Some(process) = s.process(pid) {
            debug!("killing process with id {}", pid);
            return process.kill();
        }
        false
    }
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        debug!("killing browser process...");
        self.kill();
    }
}
