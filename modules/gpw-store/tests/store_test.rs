//! Replace-by-key persistence against an in-memory SQLite database.

use chrono::{Duration, TimeZone, Utc};
use gpw_common::{
    CompanyIdentity, CompanyRecord, IndexMembership, MetricRecord, ReportRecord,
    ShareholderRecord, Tab,
};
use gpw_store::{Store, StoreError};

fn company_id(isin: &str) -> CompanyIdentity {
    CompanyIdentity::parse(&format!("https://www.gpw.pl/spolka?isin={isin}")).unwrap()
}

fn holder(id: &CompanyIdentity, name: &str, pct: &str) -> ShareholderRecord {
    ShareholderRecord {
        company_url: id.clone(),
        shareholder: name.to_string(),
        shares_count: "1 000 000".to_string(),
        shares_pct: pct.to_string(),
        votes_count: "1 000 000".to_string(),
        votes_pct: pct.to_string(),
    }
}

fn report(id: &CompanyIdentity, tab: Tab, date: &str) -> ReportRecord {
    ReportRecord {
        company_url: id.clone(),
        tab,
        date: date.to_string(),
        report_url: format!("https://www.gpw.pl/komunikat?date={date}"),
    }
}

// =========================================================================
// Replace-by-key
// =========================================================================

#[tokio::test]
async fn upsert_replaces_only_rows_of_the_upserted_key() {
    let store = Store::in_memory().await.unwrap();
    let x = company_id("PLXXX0000001");
    let y = company_id("PLYYY0000001");

    store
        .upsert(&[
            holder(&x, "Old X 1", "50,00%"),
            holder(&x, "Old X 2", "20,00%"),
            holder(&y, "Y holder", "33,00%"),
        ])
        .await
        .unwrap();

    let fresh = vec![holder(&x, "New X", "70,00%")];
    store.upsert(&fresh).await.unwrap();

    assert_eq!(store.shareholders(&x).await.unwrap(), fresh);
    assert_eq!(
        store.shareholders(&y).await.unwrap(),
        vec![holder(&y, "Y holder", "33,00%")]
    );
}

#[tokio::test]
async fn upsert_with_no_records_is_a_noop() {
    let store = Store::in_memory().await.unwrap();
    let x = company_id("PLXXX0000001");

    store.upsert(&[holder(&x, "Kept", "1,00%")]).await.unwrap();
    let inserted = store.upsert::<ShareholderRecord>(&[]).await.unwrap();

    assert_eq!(inserted, 0);
    assert_eq!(store.count::<ShareholderRecord>(&x).await.unwrap(), 1);
}

#[tokio::test]
async fn replace_for_clears_rows_when_new_set_is_empty() {
    let store = Store::in_memory().await.unwrap();
    let x = company_id("PLXXX0000001");
    let y = company_id("PLYYY0000001");

    store
        .upsert(&[
            MetricRecord {
                company_url: x.clone(),
                metric: "ROE".to_string(),
                value: "10".to_string(),
            },
            MetricRecord {
                company_url: y.clone(),
                metric: "ROE".to_string(),
                value: "5".to_string(),
            },
        ])
        .await
        .unwrap();

    store.replace_for::<MetricRecord>(&x, &[]).await.unwrap();

    assert_eq!(store.count::<MetricRecord>(&x).await.unwrap(), 0);
    assert_eq!(store.count::<MetricRecord>(&y).await.unwrap(), 1);
}

#[tokio::test]
async fn replace_for_rejects_rows_of_another_company() {
    let store = Store::in_memory().await.unwrap();
    let x = company_id("PLXXX0000001");
    let y = company_id("PLYYY0000001");

    let err = store
        .replace_for(&x, &[report(&y, Tab::Reports1, "2024-01-01")])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::KeyMismatch { table: "reports", .. }));
    assert_eq!(store.count::<ReportRecord>(&y).await.unwrap(), 0);
}

#[tokio::test]
async fn repeated_replace_yields_identical_rows() {
    let store = Store::in_memory().await.unwrap();
    let x = company_id("PLXXX0000001");
    let rows = vec![
        report(&x, Tab::Reports1, "2024-01-01"),
        report(&x, Tab::Reports2, "2024-02-01"),
    ];

    store.replace_for(&x, &rows).await.unwrap();
    let first = store.reports(&x).await.unwrap();
    store.replace_for(&x, &rows).await.unwrap();
    let second = store.reports(&x).await.unwrap();

    assert_eq!(first, rows);
    assert_eq!(first, second);
}

#[tokio::test]
async fn company_round_trips_optional_fields_and_index_membership() {
    let store = Store::in_memory().await.unwrap();
    let x = company_id("PLXXX0000001");

    let mut record = CompanyRecord::new(x.clone(), "PLXXX0000001");
    record.name = Some("Example SA".to_string());
    record.index_membership = IndexMembership::from(vec!["WIG20", "WIG"]);
    store.replace_for(&x, &[record.clone()]).await.unwrap();

    let stored = store.company(&x).await.unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(stored.ticker, None);

    let raw: String = sqlx::query_scalar("SELECT index_membership FROM company WHERE url = ?")
        .bind(x.as_str())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(raw, "WIG20,WIG");
}

#[tokio::test]
async fn concurrent_writes_to_one_table_keep_every_company() {
    let store = Store::in_memory().await.unwrap();
    let ids: Vec<_> = (0..8).map(|i| company_id(&format!("PL{i:03}0000001"))).collect();

    let mut writes = tokio::task::JoinSet::new();
    for id in ids.clone() {
        let store = store.clone();
        writes.spawn(async move {
            store
                .replace_for(&id, &[holder(&id, "Holder", "100,00%")])
                .await
        });
    }
    while let Some(result) = writes.join_next().await {
        result.unwrap().unwrap();
    }

    for id in &ids {
        assert_eq!(store.count::<ShareholderRecord>(id).await.unwrap(), 1);
    }
}

// =========================================================================
// Scrape log
// =========================================================================

#[tokio::test]
async fn scrape_log_keeps_the_later_timestamp() {
    let store = Store::in_memory().await.unwrap();
    store.migrate().await.unwrap();
    let x = company_id("PLXXX0000001");

    let newer = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
    let older = newer - Duration::hours(30);

    store.record_scrape(&x, newer).await.unwrap();
    store.record_scrape(&x, older).await.unwrap();

    let log = store.load_scrape_log().await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].identity, x);
    assert_eq!(log[0].last_scraped_at, newer);

    let newest = newer + Duration::hours(1);
    store.record_scrape(&x, newest).await.unwrap();
    assert_eq!(store.load_scrape_log().await.unwrap()[0].last_scraped_at, newest);
}

#[tokio::test]
async fn file_database_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("gpw.sqlite").display());
    let x = company_id("PLXXX0000001");

    {
        let store = Store::connect(&url).await.unwrap();
        store.migrate().await.unwrap();
        store
            .replace_for(&x, &[CompanyRecord::new(x.clone(), "PLXXX0000001")])
            .await
            .unwrap();
        store.record_scrape(&x, Utc::now()).await.unwrap();
        store.pool().close().await;
    }

    let store = Store::connect(&url).await.unwrap();
    assert!(store.company(&x).await.unwrap().is_some());
    assert_eq!(store.load_scrape_log().await.unwrap().len(), 1);
}
