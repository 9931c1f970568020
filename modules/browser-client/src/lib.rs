pub mod error;

pub use error::{BrowserError, Result};

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often a selector is re-queried while waiting for it to appear.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a selector wait requires of the matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// Present in the DOM.
    Attached,
    /// Present and rendered with a non-empty box.
    Visible,
}

/// One running browser, shared by every page opened from it. Cookies and the
/// user-agent override are browser-level, pages are handed out per caller.
pub struct BrowserClient {
    browser: Browser,
    handler: JoinHandle<()>,
    user_agent: Option<String>,
    _profile_dir: Option<tempfile::TempDir>,
}

impl BrowserClient {
    /// Launch a local headless Chromium with a throwaway profile directory.
    pub async fn launch(chrome_bin: Option<&Path>, user_agent: Option<&str>) -> Result<Self> {
        let profile_dir = tempfile::tempdir()
            .map_err(|e| BrowserError::Launch(format!("profile dir: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .user_data_dir(profile_dir.path());
        if let Some(bin) = chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let bin = chrome_bin
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "auto".to_string());
        info!(chrome_bin = bin.as_str(), "Launched local browser");

        Ok(Self {
            browser,
            handler: drive_handler(handler),
            user_agent: user_agent.map(String::from),
            _profile_dir: Some(profile_dir),
        })
    }

    /// Connect to a remote DevTools endpoint, e.g. a Browserless websocket.
    pub async fn connect(ws_url: &str, token: Option<&str>, user_agent: Option<&str>) -> Result<Self> {
        let mut endpoint = ws_url.trim_end_matches('/').to_string();
        if let Some(token) = token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let (browser, handler) = Browser::connect(endpoint)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        info!(ws_url, "Connected to remote browser");

        Ok(Self {
            browser,
            handler: drive_handler(handler),
            user_agent: user_agent.map(String::from),
            _profile_dir: None,
        })
    }

    /// Open a blank page owned by the caller.
    pub async fn new_page(&self) -> Result<BrowserPage> {
        let page = self.browser.new_page("about:blank").await?;
        let page = BrowserPage::new(page);
        if let Some(ref ua) = self.user_agent {
            page.page()?
                .set_user_agent(ua.clone())
                .await?;
        }
        Ok(page)
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        match self.browser.wait().await {
            Ok(status) => debug!(?status, "Browser process exited"),
            Err(e) => debug!(error = %e, "Browser process wait failed"),
        }
        self.handler.abort();
        debug!("Browser closed");
        Ok(())
    }
}

fn drive_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!(error = %e, "Browser handler error");
            }
        }
    })
}

/// A browser tab exclusively owned by one caller.
///
/// `close()` is the normal release path. Pages dropped without it are closed
/// from a background task so an early return never leaks a tab.
pub struct BrowserPage {
    page: Option<Page>,
    runtime: tokio::runtime::Handle,
}

impl BrowserPage {
    fn new(page: Page) -> Self {
        Self {
            page: Some(page),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    fn page(&self) -> Result<&Page> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }

    /// Navigate and wait for the load to finish.
    pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        bounded("navigate", url, timeout, async {
            page.goto(url).await?;
            Ok(())
        })
        .await
    }

    /// Wait until `selector` matches a visible element, then click it.
    pub async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        bounded("click", selector, timeout, async {
            let element = self.poll_element(selector, Readiness::Visible).await?;
            element.click().await?;
            Ok(())
        })
        .await
    }

    /// Wait until `selector` matches a visible element. Hidden placeholders
    /// keep the wait going.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        bounded("wait for", selector, timeout, async {
            self.poll_element(selector, Readiness::Visible)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Rendered inner text of the first element matching `selector`.
    pub async fn inner_text(&self, selector: &str, timeout: Duration) -> Result<Option<String>> {
        bounded("read text", selector, timeout, async {
            let element = self.poll_element(selector, Readiness::Attached).await?;
            Ok(element.inner_text().await?)
        })
        .await
    }

    /// Serialized DOM of the page as it is right now.
    pub async fn content(&self) -> Result<String> {
        Ok(self.page()?.content().await?)
    }

    pub async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            page.close().await?;
            debug!("Page closed");
        }
        Ok(())
    }

    async fn poll_element(&self, selector: &str, readiness: Readiness) -> Result<Element> {
        let page = self.page()?;
        loop {
            if let Ok(element) = page.find_element(selector).await {
                if readiness == Readiness::Attached || is_rendered(&element).await {
                    return Ok(element);
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for BrowserPage {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    warn!(error = %e, "Page cleanup on drop failed");
                }
            });
        }
    }
}

/// Elements that are not rendered (e.g. inside a `display: none` pane) have no
/// box model, so the lookup fails.
async fn is_rendered(element: &Element) -> bool {
    match element.bounding_box().await {
        Ok(bbox) => has_area(bbox.width, bbox.height),
        Err(_) => false,
    }
}

fn has_area(width: f64, height: f64) -> bool {
    width > 0.0 && height > 0.0
}

async fn bounded<T, F>(action: &'static str, target: &str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout {
            action,
            target: target.to_string(),
            after,
        }),
    }
}
