use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::GpwError;

/// Root of the exchange website. Company links and report hrefs on the site
/// are relative to it.
pub const SITE_BASE_URL: &str = "https://www.gpw.pl/";

// --- Identity ---

/// Canonical profile URL of a listed company, e.g.
/// `https://www.gpw.pl/spolka?isin=PLPKO0000016`.
///
/// Used as the join key across every persisted table, so parsing must be
/// deterministic: surrounding whitespace and fragments are dropped, relative
/// links are resolved against [`SITE_BASE_URL`].
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct CompanyIdentity(String);

impl CompanyIdentity {
    pub fn parse(raw: &str) -> Result<Self, GpwError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GpwError::InvalidIdentity {
                raw: raw.to_string(),
                reason: "empty".to_string(),
            });
        }

        let invalid = |reason: String| GpwError::InvalidIdentity {
            raw: raw.to_string(),
            reason,
        };

        let mut url = match Url::parse(trimmed) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(SITE_BASE_URL)
                .and_then(|base| base.join(trimmed))
                .map_err(|e| invalid(e.to_string()))?,
            Err(e) => return Err(invalid(e.to_string())),
        };

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        url.set_fragment(None);

        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `isin` query parameter of the profile URL, if it has one.
    pub fn isin(&self) -> Option<String> {
        let url = Url::parse(&self.0).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "isin")
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl std::fmt::Display for CompanyIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CompanyIdentity {
    type Err = GpwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// --- Tabs ---

/// In-page sections of a company profile. Activated client-side, so one
/// page load serves all of them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "lowercase")]
pub enum Tab {
    Info,
    Quotations,
    Indicators,
    Reports1,
    Reports2,
    Shareholders,
    Notoria,
}

impl Tab {
    pub const ALL: [Tab; 7] = [
        Tab::Info,
        Tab::Quotations,
        Tab::Indicators,
        Tab::Reports1,
        Tab::Reports2,
        Tab::Shareholders,
        Tab::Notoria,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Info => "info",
            Tab::Quotations => "quotations",
            Tab::Indicators => "indicators",
            Tab::Reports1 => "reports1",
            Tab::Reports2 => "reports2",
            Tab::Shareholders => "shareholders",
            Tab::Notoria => "notoria",
        }
    }

    /// DOM id of the tab's content section (without the leading `#`).
    pub fn anchor(&self) -> &'static str {
        match self {
            Tab::Info => "infoTab",
            Tab::Quotations => "quotationsTab",
            Tab::Indicators => "indicatorsTab",
            Tab::Reports1 => "reportsTab1",
            Tab::Reports2 => "reportsTab2",
            Tab::Shareholders => "shareholdersTab",
            Tab::Notoria => "showNotoria",
        }
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Records ---

/// Ordered list of market indices a company belongs to. Stored as a
/// comma-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexMembership(pub Vec<String>);

impl IndexMembership {
    pub fn to_column(&self) -> String {
        self.0.join(",")
    }
}

impl From<String> for IndexMembership {
    fn from(column: String) -> Self {
        Self(
            column
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

impl From<Vec<&str>> for IndexMembership {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(String::from).collect())
    }
}

/// One row per company: profile, quotation and indicator fields as shown on
/// the site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyRecord {
    pub url: CompanyIdentity,
    pub isin: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ticker: Option<String>,
    pub full_name: Option<String>,
    pub president: Option<String>,
    pub province: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub debut_date: Option<String>,
    pub issued_shares: Option<String>,
    pub market_cap_mln: Option<String>,
    pub book_value_mln: Option<String>,
    pub price_to_book: Option<String>,
    pub pe_ratio: Option<String>,
    pub dividend_yield_percent: Option<String>,
    #[sqlx(try_from = "String")]
    pub index_membership: IndexMembership,
    pub last_price: Option<String>,
    pub change: Option<String>,
    pub bid: Option<String>,
    pub ask: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub volume: Option<String>,
    pub turnover_value: Option<String>,
    pub debut_price: Option<String>,
    pub max_52w: Option<String>,
    pub min_52w: Option<String>,
    pub market_segment: Option<String>,
    pub sector: Option<String>,
}

impl CompanyRecord {
    /// A record with only the identity fields set.
    pub fn new(url: CompanyIdentity, isin: impl Into<String>) -> Self {
        Self {
            url,
            isin: isin.into(),
            ..Default::default()
        }
    }
}

impl Default for CompanyIdentity {
    fn default() -> Self {
        Self(SITE_BASE_URL.to_string())
    }
}

/// A periodic report or current disclosure listed on one of the two report tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReportRecord {
    pub company_url: CompanyIdentity,
    pub tab: Tab,
    pub date: String,
    pub report_url: String,
}

/// Shareholder structure row. Counts and percentages keep the site's display
/// formatting (`"1 234 567"`, `"12,34%"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareholderRecord {
    pub company_url: CompanyIdentity,
    pub shareholder: String,
    pub shares_count: String,
    pub shares_pct: String,
    pub votes_count: String,
    pub votes_pct: String,
}

/// Financial metric from the Notoria tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricRecord {
    pub company_url: CompanyIdentity,
    pub metric: String,
    pub value: String,
}

/// Last fully successful scrape of one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScrapeLogEntry {
    pub identity: CompanyIdentity,
    pub last_scraped_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_parse_drops_fragment_and_whitespace() {
        let id = CompanyIdentity::parse("  https://www.gpw.pl/spolka?isin=PLPKO0000016#tab  ").unwrap();
        assert_eq!(id.as_str(), "https://www.gpw.pl/spolka?isin=PLPKO0000016");
    }

    #[test]
    fn identity_parse_resolves_relative_links() {
        let id = CompanyIdentity::parse("spolka?isin=PLPKO0000016").unwrap();
        assert_eq!(id.as_str(), "https://www.gpw.pl/spolka?isin=PLPKO0000016");
    }

    #[test]
    fn identity_parse_is_stable_across_calls() {
        let a = CompanyIdentity::parse("https://www.gpw.pl/spolka?isin=PLPKO0000016").unwrap();
        let b = CompanyIdentity::parse(a.as_str()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identity_parse_rejects_empty_and_non_http() {
        assert!(CompanyIdentity::parse("   ").is_err());
        assert!(CompanyIdentity::parse("ftp://www.gpw.pl/spolka").is_err());
    }

    #[test]
    fn identity_exposes_isin() {
        let id = CompanyIdentity::parse("https://www.gpw.pl/spolka?isin=PLPKO0000016").unwrap();
        assert_eq!(id.isin().as_deref(), Some("PLPKO0000016"));

        let bare = CompanyIdentity::parse("https://www.gpw.pl/spolka").unwrap();
        assert_eq!(bare.isin(), None);
    }

    #[test]
    fn index_membership_column_format() {
        let m = IndexMembership::from(vec!["WIG20", "WIG"]);
        assert_eq!(m.to_column(), "WIG20,WIG");
        assert_eq!(IndexMembership::from("WIG20,WIG".to_string()), m);
        assert_eq!(IndexMembership::from(String::new()), IndexMembership::default());
    }

    #[test]
    fn tab_names_and_anchors() {
        assert_eq!(Tab::Reports1.as_str(), "reports1");
        assert_eq!(Tab::Notoria.anchor(), "showNotoria");
        assert_eq!(Tab::ALL.len(), 7);
    }
}
