// One company, end to end: skip check, navigate, extract, persist, mark.

use chrono::Utc;
use tracing::{info, warn};

use gpw_common::CompanyIdentity;
use gpw_store::StoreError;

use crate::deps::ScrapeDeps;
use crate::error::ScrapeError;
use crate::extractor::{self, Extraction};
use crate::navigator::TabNavigator;

/// Result of scraping one company.
#[derive(Debug)]
pub enum Outcome {
    Success,
    SkippedFresh,
    Failed(ScrapeError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::SkippedFresh)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

pub struct CompanyScrapeTask {
    deps: ScrapeDeps,
}

impl CompanyScrapeTask {
    pub fn new(deps: ScrapeDeps) -> Self {
        Self { deps }
    }

    /// Scrape one company. Every error is logged here and folded into
    /// `Outcome::Failed`; nothing propagates to the batch.
    pub async fn run(&self, identity: &CompanyIdentity) -> Outcome {
        if self.deps.staleness.should_skip(identity, Utc::now()).await {
            info!(identity = %identity, "Skipping, scraped recently");
            return Outcome::SkippedFresh;
        }

        info!(identity = %identity, "Scraping company");
        match self.scrape(identity).await {
            Ok(extraction) => {
                info!(
                    identity = %identity,
                    reports = extraction.reports.len(),
                    shareholders = extraction.shareholders.len(),
                    metrics = extraction.metrics.len(),
                    "Company scraped"
                );
                Outcome::Success
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Company scrape failed");
                Outcome::Failed(e)
            }
        }
    }

    async fn scrape(&self, identity: &CompanyIdentity) -> Result<Extraction, ScrapeError> {
        let mut page = self
            .deps
            .pages
            .open_page()
            .await
            .map_err(ScrapeError::OpenPage)?;

        let navigated = TabNavigator::new(page.as_ref(), identity).run().await;
        if let Err(e) = page.close().await {
            warn!(identity = %identity, error = %e, "Failed to close page");
        }
        let bundle = navigated?;

        let extraction = extractor::extract(identity, &bundle);
        drop(bundle);

        self.persist(identity, &extraction).await?;

        self.deps
            .staleness
            .mark_scraped(identity, Utc::now())
            .await
            .map_err(ScrapeError::ScrapeLog)?;

        Ok(extraction)
    }

    /// Each record kind replaces the company's previous rows in its own
    /// transaction.
    async fn persist(
        &self,
        identity: &CompanyIdentity,
        extraction: &Extraction,
    ) -> Result<(), StoreError> {
        let store = &self.deps.store;
        store
            .replace_for(identity, std::slice::from_ref(&extraction.company))
            .await?;
        store.replace_for(identity, &extraction.reports).await?;
        store.replace_for(identity, &extraction.shareholders).await?;
        store.replace_for(identity, &extraction.metrics).await?;
        Ok(())
    }
}
