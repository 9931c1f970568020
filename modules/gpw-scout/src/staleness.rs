// Last-scrape bookkeeping, mirrored in memory and in the `scrape_log` table.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::info;

use gpw_common::CompanyIdentity;
use gpw_store::{Store, StoreError};

/// Decides whether a company was scraped recently enough to skip.
///
/// Reads take the shared lock, so many workers can check at once. Writes go
/// to the database first; the in-memory entry only moves forward.
pub struct StalenessLog {
    store: Store,
    window: Duration,
    entries: RwLock<HashMap<CompanyIdentity, DateTime<Utc>>>,
}

impl StalenessLog {
    /// Load every persisted entry. Creates the table if it is missing.
    pub async fn load(store: Store, window: Duration) -> Result<Self, StoreError> {
        store.migrate().await?;

        let mut entries: HashMap<CompanyIdentity, DateTime<Utc>> = HashMap::new();
        for entry in store.load_scrape_log().await? {
            entries
                .entry(entry.identity)
                .and_modify(|at| *at = (*at).max(entry.last_scraped_at))
                .or_insert(entry.last_scraped_at);
        }

        info!(
            entries = entries.len(),
            window_hours = window.num_hours(),
            "Loaded scrape log"
        );

        Ok(Self {
            store,
            window,
            entries: RwLock::new(entries),
        })
    }

    /// True when the last recorded scrape is younger than the window. A zero
    /// window never skips.
    pub async fn should_skip(&self, identity: &CompanyIdentity, now: DateTime<Utc>) -> bool {
        if self.window <= Duration::zero() {
            return false;
        }
        match self.entries.read().await.get(identity) {
            Some(at) => now.signed_duration_since(*at) < self.window,
            None => false,
        }
    }

    pub async fn last_scraped(&self, identity: &CompanyIdentity) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(identity).copied()
    }

    /// Record a successful scrape. An older `at` never replaces a newer one.
    pub async fn mark_scraped(
        &self,
        identity: &CompanyIdentity,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store.record_scrape(identity, at).await?;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(identity.clone()).or_insert(at);
        if at > *entry {
            *entry = at;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
