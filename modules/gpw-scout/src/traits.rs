// Trait seams between the scrape pipeline and the browser.
//
// PageSource hands out pages, PageSession drives one of them. Production uses
// browser_client; tests use MockBrowser from `testing`.

use std::time::Duration;

use async_trait::async_trait;
use browser_client::{BrowserClient, BrowserPage, Result};

/// One browser tab, exclusively owned by one scrape.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Text of the first element matching `selector`, waiting up to `timeout`.
    async fn inner_text(&self, selector: &str, timeout: Duration) -> Result<Option<String>>;

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Full serialized DOM at this instant.
    async fn content(&self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

/// Something that can open fresh pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageSession>>;
}

#[async_trait]
impl PageSession for BrowserPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        BrowserPage::goto(self, url, timeout).await
    }

    async fn inner_text(&self, selector: &str, timeout: Duration) -> Result<Option<String>> {
        BrowserPage::inner_text(self, selector, timeout).await
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        BrowserPage::click(self, selector, timeout).await
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        BrowserPage::wait_for(self, selector, timeout).await
    }

    async fn content(&self) -> Result<String> {
        BrowserPage::content(self).await
    }

    async fn close(&mut self) -> Result<()> {
        BrowserPage::close(self).await
    }
}

#[async_trait]
impl PageSource for BrowserClient {
    async fn open_page(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(self.new_page().await?))
    }
}
