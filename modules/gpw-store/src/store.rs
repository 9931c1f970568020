// SQLite persistence for scraped company data.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::{debug, info};

use gpw_common::{
    CompanyIdentity, CompanyRecord, MetricRecord, ReportRecord, ScrapeLogEntry, ShareholderRecord,
};

use crate::error::{Result, StoreError};
use crate::record::{create_table_sql, TableRecord};

/// SQLite allows 999 bound parameters per statement on older builds.
const MAX_BIND_PARAMS: usize = 900;

/// Handle to the scrape database. Cheap to clone; clones share the pool and
/// the per-table write locks.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    tables: Arc<Mutex<HashMap<&'static str, Arc<tokio::sync::Mutex<bool>>>>>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tables: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite://data/gpw_data.sqlite`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!(url, "Connected to SQLite");
        Ok(Self::new(pool))
    }

    /// Private in-memory database. A single connection that never idles out,
    /// since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the scrape log table.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scrape_log (
                identity        TEXT PRIMARY KEY NOT NULL,
                last_scraped_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Replace-by-key writes ---

    /// Delete every row whose key matches a key present in `records`, then
    /// insert `records`. Rows for other keys are untouched. An empty slice has
    /// no keys and is a no-op.
    pub async fn upsert<R: TableRecord>(&self, records: &[R]) -> Result<u64> {
        let mut seen = HashSet::new();
        let keys: Vec<&CompanyIdentity> = records
            .iter()
            .map(|r| r.key())
            .filter(|k| seen.insert(*k))
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }
        self.replace_rows(&keys, records).await
    }

    /// Replace all rows of one company. Unlike [`Store::upsert`], an empty
    /// slice still clears the company's existing rows.
    pub async fn replace_for<R: TableRecord>(
        &self,
        identity: &CompanyIdentity,
        records: &[R],
    ) -> Result<u64> {
        if let Some(stray) = records.iter().find(|r| r.key() != identity) {
            return Err(StoreError::KeyMismatch {
                table: R::TABLE,
                expected: identity.clone(),
                found: stray.key().clone(),
            });
        }
        self.replace_rows(&[identity], records).await
    }

    async fn replace_rows<R: TableRecord>(
        &self,
        keys: &[&CompanyIdentity],
        records: &[R],
    ) -> Result<u64> {
        let table = self.table_lock::<R>().await?;
        let _guard = table.lock().await;

        let mut tx = self.pool.begin().await?;

        let mut deleted = 0;
        for chunk in keys.chunks(MAX_BIND_PARAMS) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "DELETE FROM {} WHERE {} IN (",
                R::TABLE,
                R::KEY_COLUMN
            ));
            let mut separated = qb.separated(", ");
            for key in chunk {
                separated.push_bind(key.as_str().to_string());
            }
            separated.push_unseparated(")");
            deleted += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        let rows_per_insert = (MAX_BIND_PARAMS / R::COLUMNS.len()).max(1);
        let mut inserted = 0;
        for chunk in records.chunks(rows_per_insert) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "INSERT INTO {} ({}) ",
                R::TABLE,
                R::COLUMNS.join(", ")
            ));
            qb.push_values(chunk, |mut row, record| {
                for value in record.values() {
                    row.push_bind(value);
                }
            });
            inserted += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        debug!(table = R::TABLE, keys = keys.len(), deleted, inserted, "Replaced rows");
        Ok(inserted)
    }

    /// Per-table write lock. The first caller creates the table.
    async fn table_lock<R: TableRecord>(&self) -> Result<Arc<tokio::sync::Mutex<bool>>> {
        let lock = {
            let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
            tables
                .entry(R::TABLE)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(false)))
                .clone()
        };

        let mut created = lock.lock().await;
        if !*created {
            for statement in create_table_sql::<R>() {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
            *created = true;
        }
        drop(created);

        Ok(lock)
    }

    // --- Reads ---

    /// Rows of one company in insertion order.
    pub async fn rows_for<R>(&self, identity: &CompanyIdentity) -> Result<Vec<R>>
    where
        R: TableRecord + for<'r> FromRow<'r, SqliteRow> + Unpin + Send,
    {
        self.table_lock::<R>().await?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? ORDER BY rowid",
            R::COLUMNS.join(", "),
            R::TABLE,
            R::KEY_COLUMN
        );
        let rows = sqlx::query_as::<_, R>(&sql)
            .bind(identity.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count<R: TableRecord>(&self, identity: &CompanyIdentity) -> Result<i64> {
        self.table_lock::<R>().await?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            R::TABLE,
            R::KEY_COLUMN
        );
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(identity.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn company(&self, identity: &CompanyIdentity) -> Result<Option<CompanyRecord>> {
        Ok(self.rows_for::<CompanyRecord>(identity).await?.into_iter().next())
    }

    pub async fn reports(&self, identity: &CompanyIdentity) -> Result<Vec<ReportRecord>> {
        self.rows_for(identity).await
    }

    pub async fn shareholders(&self, identity: &CompanyIdentity) -> Result<Vec<ShareholderRecord>> {
        self.rows_for(identity).await
    }

    pub async fn metrics(&self, identity: &CompanyIdentity) -> Result<Vec<MetricRecord>> {
        self.rows_for(identity).await
    }

    // --- Scrape log ---

    pub async fn load_scrape_log(&self) -> Result<Vec<ScrapeLogEntry>> {
        let rows = sqlx::query_as::<_, ScrapeLogEntry>(
            "SELECT identity, last_scraped_at FROM scrape_log",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert or advance the entry for `identity`. An older timestamp never
    /// overwrites a newer one.
    pub async fn record_scrape(&self, identity: &CompanyIdentity, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrape_log (identity, last_scraped_at)
            VALUES (?, ?)
            ON CONFLICT(identity) DO UPDATE
                SET last_scraped_at = excluded.last_scraped_at
                WHERE excluded.last_scraped_at > scrape_log.last_scraped_at
            "#,
        )
        .bind(identity.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
