// Test mocks for the scrape pipeline.
//
// MockBrowser (PageSource) hands out MockPages that serve canned HTML per
// company URL. Page lifecycle counters let tests check the concurrency bound
// and that every page is closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use browser_client::{BrowserError, Result};
use gpw_common::{CompanyIdentity, Tab};

use crate::fixtures::CompanyPage;
use crate::navigator::{tab_content_selector, tab_control_selector, DESCRIPTION_SELECTOR};
use crate::traits::{PageSession, PageSource};

// ---------------------------------------------------------------------------
// MockSite
// ---------------------------------------------------------------------------

/// How one company page behaves in the mock browser.
#[derive(Debug, Clone, Default)]
pub struct MockSite {
    html: String,
    description: Option<String>,
    missing_tabs: Vec<Tab>,
    slow_tabs: Vec<Tab>,
    fail_navigation: bool,
    fail_content: bool,
}

impl MockSite {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Default::default()
        }
    }

    /// Serve a fixture page. Tabs the fixture omits have no nav link.
    pub fn from_page(page: &CompanyPage) -> Self {
        let mut site = Self::new(&page.html());
        site.description = page.description_text().map(String::from);
        site.missing_tabs = page.omitted().to_vec();
        site
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// The nav link for `tab` never appears.
    pub fn missing_tab(mut self, tab: Tab) -> Self {
        self.missing_tabs.push(tab);
        self
    }

    /// The link clicks, but the tab's table never renders.
    pub fn slow_tab(mut self, tab: Tab) -> Self {
        self.slow_tabs.push(tab);
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn failing_content(mut self) -> Self {
        self.fail_content = true;
        self
    }
}

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PageCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    dropped_open: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
}

impl PageCounters {
    fn release(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.open_now.fetch_sub(1, Ordering::SeqCst);
    }
}

/// URL-keyed fake browser. Unregistered URLs time out on navigation.
/// Builder pattern: `.on_site()`, `.with_page_delay()`.
#[derive(Default)]
pub struct MockBrowser {
    sites: Arc<HashMap<String, MockSite>>,
    counters: Arc<PageCounters>,
    page_delay: Duration,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_site(mut self, identity: &CompanyIdentity, site: MockSite) -> Self {
        Arc::make_mut(&mut self.sites).insert(identity.as_str().to_string(), site);
        self
    }

    pub fn on_page(self, identity: &CompanyIdentity, page: &CompanyPage) -> Self {
        self.on_site(identity, MockSite::from_page(page))
    }

    /// Every navigation takes this long, so concurrent scrapes overlap.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn pages_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Pages released by drop instead of an explicit close.
    pub fn pages_dropped_open(&self) -> usize {
        self.counters.dropped_open.load(Ordering::SeqCst)
    }

    pub fn max_open_pages(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for MockBrowser {
    async fn open_page(&self) -> Result<Box<dyn PageSession>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(MockPage {
            sites: self.sites.clone(),
            counters: self.counters.clone(),
            delay: self.page_delay,
            loaded: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }
}

// ---------------------------------------------------------------------------
// MockPage
// ---------------------------------------------------------------------------

struct MockPage {
    sites: Arc<HashMap<String, MockSite>>,
    counters: Arc<PageCounters>,
    delay: Duration,
    loaded: Mutex<Option<MockSite>>,
    closed: AtomicBool,
}

impl MockPage {
    fn loaded(&self) -> Result<MockSite> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| BrowserError::Cdp("no document loaded".to_string()))
    }
}

fn timeout(action: &'static str, target: &str, after: Duration) -> BrowserError {
    BrowserError::Timeout {
        action,
        target: target.to_string(),
        after,
    }
}

fn tab_matching(selector: &str, to_selector: fn(Tab) -> String) -> Option<Tab> {
    Tab::ALL.into_iter().find(|tab| to_selector(*tab) == selector)
}

#[async_trait]
impl PageSession for MockPage {
    async fn goto(&self, url: &str, after: Duration) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.sites.get(url) {
            None => Err(timeout("navigate", url, after)),
            Some(site) if site.fail_navigation => {
                Err(BrowserError::Cdp("net::ERR_CONNECTION_RESET".to_string()))
            }
            Some(site) => {
                *self.loaded.lock().unwrap_or_else(PoisonError::into_inner) = Some(site.clone());
                Ok(())
            }
        }
    }

    async fn inner_text(&self, selector: &str, after: Duration) -> Result<Option<String>> {
        let site = self.loaded()?;
        match (selector == DESCRIPTION_SELECTOR, site.description) {
            (true, Some(text)) => Ok(Some(text)),
            _ => Err(timeout("read text", selector, after)),
        }
    }

    async fn click(&self, selector: &str, after: Duration) -> Result<()> {
        let site = self.loaded()?;
        match tab_matching(selector, tab_control_selector) {
            Some(tab) if !site.missing_tabs.contains(&tab) => Ok(()),
            _ => Err(timeout("click", selector, after)),
        }
    }

    async fn wait_for(&self, selector: &str, after: Duration) -> Result<()> {
        let site = self.loaded()?;
        match tab_matching(selector, tab_content_selector) {
            Some(tab) if !site.slow_tabs.contains(&tab) => Ok(()),
            _ => Err(timeout("wait for", selector, after)),
        }
    }

    async fn content(&self) -> Result<String> {
        let site = self.loaded()?;
        if site.fail_content {
            return Err(BrowserError::Cdp("Target closed".to_string()));
        }
        Ok(site.html)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.release();
        }
        Ok(())
    }
}

impl Drop for MockPage {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.dropped_open.fetch_add(1, Ordering::SeqCst);
            self.counters.release();
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Identity for a synthetic ISIN.
pub fn company(isin: &str) -> CompanyIdentity {
    CompanyIdentity::parse(&format!("https://www.gpw.pl/spolka?isin={isin}"))
        .expect("valid company URL")
}
