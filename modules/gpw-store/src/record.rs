// Column layout of each persisted record kind.
//
// Tables are created from these lists on first use, so the order of
// COLUMNS and of values() must match.

use gpw_common::{CompanyIdentity, CompanyRecord, MetricRecord, ReportRecord, ShareholderRecord};

/// A record kind stored in its own table, keyed by company identity.
pub trait TableRecord: Send + Sync {
    const TABLE: &'static str;
    /// Column holding the company identity. Replace-by-key deletes on it.
    const KEY_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> &CompanyIdentity;

    /// Column values in `COLUMNS` order.
    fn values(&self) -> Vec<Option<String>>;
}

impl TableRecord for CompanyRecord {
    const TABLE: &'static str = "company";
    const KEY_COLUMN: &'static str = "url";
    const COLUMNS: &'static [&'static str] = &[
        "url",
        "isin",
        "name",
        "description",
        "ticker",
        "full_name",
        "president",
        "province",
        "address",
        "phone",
        "fax",
        "website",
        "email",
        "debut_date",
        "issued_shares",
        "market_cap_mln",
        "book_value_mln",
        "price_to_book",
        "pe_ratio",
        "dividend_yield_percent",
        "index_membership",
        "last_price",
        "change",
        "bid",
        "ask",
        "min_price",
        "max_price",
        "volume",
        "turnover_value",
        "debut_price",
        "max_52w",
        "min_52w",
        "market_segment",
        "sector",
    ];

    fn key(&self) -> &CompanyIdentity {
        &self.url
    }

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.url.to_string()),
            Some(self.isin.clone()),
            self.name.clone(),
            self.description.clone(),
            self.ticker.clone(),
            self.full_name.clone(),
            self.president.clone(),
            self.province.clone(),
            self.address.clone(),
            self.phone.clone(),
            self.fax.clone(),
            self.website.clone(),
            self.email.clone(),
            self.debut_date.clone(),
            self.issued_shares.clone(),
            self.market_cap_mln.clone(),
            self.book_value_mln.clone(),
            self.price_to_book.clone(),
            self.pe_ratio.clone(),
            self.dividend_yield_percent.clone(),
            Some(self.index_membership.to_column()),
            self.last_price.clone(),
            self.change.clone(),
            self.bid.clone(),
            self.ask.clone(),
            self.min_price.clone(),
            self.max_price.clone(),
            self.volume.clone(),
            self.turnover_value.clone(),
            self.debut_price.clone(),
            self.max_52w.clone(),
            self.min_52w.clone(),
            self.market_segment.clone(),
            self.sector.clone(),
        ]
    }
}

impl TableRecord for ReportRecord {
    const TABLE: &'static str = "reports";
    const KEY_COLUMN: &'static str = "company_url";
    const COLUMNS: &'static [&'static str] = &["company_url", "tab", "date", "report_url"];

    fn key(&self) -> &CompanyIdentity {
        &self.company_url
    }

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.company_url.to_string()),
            Some(self.tab.as_str().to_string()),
            Some(self.date.clone()),
            Some(self.report_url.clone()),
        ]
    }
}

impl TableRecord for ShareholderRecord {
    const TABLE: &'static str = "shareholders";
    const KEY_COLUMN: &'static str = "company_url";
    const COLUMNS: &'static [&'static str] = &[
        "company_url",
        "shareholder",
        "shares_count",
        "shares_pct",
        "votes_count",
        "votes_pct",
    ];

    fn key(&self) -> &CompanyIdentity {
        &self.company_url
    }

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.company_url.to_string()),
            Some(self.shareholder.clone()),
            Some(self.shares_count.clone()),
            Some(self.shares_pct.clone()),
            Some(self.votes_count.clone()),
            Some(self.votes_pct.clone()),
        ]
    }
}

impl TableRecord for MetricRecord {
    const TABLE: &'static str = "metrics";
    const KEY_COLUMN: &'static str = "company_url";
    const COLUMNS: &'static [&'static str] = &["company_url", "metric", "value"];

    fn key(&self) -> &CompanyIdentity {
        &self.company_url
    }

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.company_url.to_string()),
            Some(self.metric.clone()),
            Some(self.value.clone()),
        ]
    }
}

/// `CREATE TABLE` + key index for a record kind. Every column is TEXT; the
/// key column is NOT NULL.
pub(crate) fn create_table_sql<R: TableRecord>() -> [String; 2] {
    let columns = R::COLUMNS
        .iter()
        .map(|c| {
            if *c == R::KEY_COLUMN {
                format!("{c} TEXT NOT NULL")
            } else {
                format!("{c} TEXT")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    [
        format!("CREATE TABLE IF NOT EXISTS {} ({columns})", R::TABLE),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{key} ON {table} ({key})",
            table = R::TABLE,
            key = R::KEY_COLUMN,
        ),
    ]
}
