use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("DevTools protocol error: {0}")]
    Cdp(String),

    #[error("{action} timed out after {after:?}: {target}")]
    Timeout {
        action: &'static str,
        target: String,
        after: Duration,
    },

    #[error("Page already closed")]
    Closed,
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Cdp(err.to_string())
    }
}
