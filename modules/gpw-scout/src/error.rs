use browser_client::BrowserError;
use gpw_store::StoreError;
use thiserror::Error;

/// Why one company's scrape failed. Never fatal beyond that company.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Could not open a browser page: {0}")]
    OpenPage(#[source] BrowserError),

    #[error("Navigation failed: {0}")]
    Navigation(#[source] BrowserError),

    #[error("Page content unavailable: {0}")]
    Content(#[source] BrowserError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Scrape log update failed: {0}")]
    ScrapeLog(#[source] StoreError),

    #[error("Scrape worker aborted: {0}")]
    Aborted(String),
}
