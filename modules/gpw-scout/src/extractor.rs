// Pure HTML -> record extraction over a navigator bundle.
//
// Never fails: anything missing on the page becomes None or an empty list.

use scraper::{ElementRef, Html, Selector};

use gpw_common::{
    CompanyIdentity, CompanyRecord, IndexMembership, MetricRecord, ReportRecord,
    ShareholderRecord, Tab, SITE_BASE_URL,
};

use crate::navigator::TabSnapshotBundle;

const INDEX_MEMBERSHIP_LABEL: &str = "Przynależność do indeksu";

/// Snapshots searched for label/value fields, first hit wins.
const FIELD_SOURCES: [Tab; 3] = [Tab::Info, Tab::Indicators, Tab::Quotations];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

struct Selectors {
    row: Selector,
    th: Selector,
    td: Selector,
    link: Selector,
    report_link: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            row: selector("tr"),
            th: selector("th"),
            td: selector("td"),
            link: selector("a"),
            report_link: selector("a[href^='komunikat']"),
        }
    }
}

/// Everything extracted for one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub company: CompanyRecord,
    pub reports: Vec<ReportRecord>,
    pub shareholders: Vec<ShareholderRecord>,
    pub metrics: Vec<MetricRecord>,
}

/// Collapse every whitespace run (U+00A0 included) to one space and trim.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

pub fn extract(identity: &CompanyIdentity, bundle: &TabSnapshotBundle) -> Extraction {
    let sel = Selectors::new();
    let field_docs: Vec<Html> = FIELD_SOURCES
        .iter()
        .filter_map(|tab| bundle.snapshot(*tab))
        .map(Html::parse_document)
        .collect();

    let company = extract_company(&sel, identity, bundle, &field_docs);

    let mut reports = Vec::new();
    for tab in [Tab::Reports1, Tab::Reports2] {
        if let Some(html) = bundle.snapshot(tab) {
            let doc = Html::parse_document(html);
            reports.extend(extract_reports(&sel, identity, tab, &doc));
        }
    }

    let shareholders = bundle
        .snapshot(Tab::Shareholders)
        .map(|html| extract_shareholders(&sel, identity, &Html::parse_document(html)))
        .unwrap_or_default();

    let metrics = bundle
        .snapshot(Tab::Notoria)
        .map(|html| extract_metrics(&sel, identity, &Html::parse_document(html)))
        .unwrap_or_default();

    Extraction {
        company,
        reports,
        shareholders,
        metrics,
    }
}

fn extract_company(
    sel: &Selectors,
    identity: &CompanyIdentity,
    bundle: &TabSnapshotBundle,
    docs: &[Html],
) -> CompanyRecord {
    let info = |label: &str| field(sel, docs, Tab::Info, label);
    let ind = |label: &str| field(sel, docs, Tab::Indicators, label);
    let quo = |label: &str| field(sel, docs, Tab::Quotations, label);

    let isin = ind("ISIN")
        .or_else(|| identity.isin())
        .unwrap_or_default();

    let mut record = CompanyRecord::new(identity.clone(), isin);
    record.description = bundle.description.as_deref().map(normalize_text);
    record.name = info("Nazwa:");
    record.ticker = info("Skrót:");
    record.full_name = info("Nazwa pełna:");
    record.president = info("Prezes Zarządu:");
    record.province = info("Województwo:");
    record.address = info("Adres siedziby:");
    record.phone = info("Numer telefonu:");
    record.fax = info("Numer faksu:");
    record.website = info("Strona www:");
    record.email = info("E-mail:");
    record.debut_date = info("Na giełdzie od:");
    record.issued_shares = ind("Liczba wyemitowanych akcji");
    record.market_cap_mln = ind("Wartość rynkowa");
    record.book_value_mln = ind("Wartość księgowa");
    record.price_to_book = ind("C/WK");
    record.pe_ratio = ind("C/Z");
    record.dividend_yield_percent = ind("Stopa dywidendy");
    record.market_segment = ind("Rynek/Segment");
    record.sector = ind("Sektor");
    record.last_price = quo("Kurs ostatni");
    record.change = quo("Zmiana");
    record.bid = quo("Oferta kupna");
    record.ask = quo("Oferta sprzedaży");
    record.min_price = quo("Min.");
    record.max_price = quo("Max.");
    record.volume = quo("Wol. obrotu");
    record.turnover_value = quo("Wart. obrotu");
    record.debut_price = quo("Data i kurs debiutu");
    record.max_52w = quo("Max historyczny");
    record.min_52w = quo("Min historyczny");
    record.index_membership = index_membership(sel, docs);
    record
}

/// Rows of the `#<anchor>` section of `tab` in one document.
fn section_rows<'d>(sel: &Selectors, doc: &'d Html, tab: Tab) -> Vec<ElementRef<'d>> {
    let section = selector(&format!("#{}", tab.anchor()));
    doc.select(&section)
        .flat_map(|s| s.select(&sel.row).collect::<Vec<_>>())
        .collect()
}

/// First row in the section whose header contains `label`.
fn labelled_row<'d>(
    sel: &Selectors,
    doc: &'d Html,
    tab: Tab,
    label: &str,
) -> Option<ElementRef<'d>> {
    section_rows(sel, doc, tab)
        .into_iter()
        .find(|row| row.select(&sel.th).any(|th| element_text(th).contains(label)))
}

fn field(sel: &Selectors, docs: &[Html], tab: Tab, label: &str) -> Option<String> {
    docs.iter().find_map(|doc| {
        let row = labelled_row(sel, doc, tab, label)?;
        let value = element_text(row.select(&sel.td).next()?);
        (!value.is_empty()).then_some(value)
    })
}

fn index_membership(sel: &Selectors, docs: &[Html]) -> IndexMembership {
    let names: Vec<String> = docs
        .iter()
        .find_map(|doc| labelled_row(sel, doc, Tab::Quotations, INDEX_MEMBERSHIP_LABEL))
        .map(|row| {
            row.select(&sel.td)
                .flat_map(|td| td.select(&sel.link).map(element_text).collect::<Vec<_>>())
                .filter(|name| !name.is_empty())
                .fold(Vec::new(), |mut names, name| {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                    names
                })
        })
        .unwrap_or_default();
    IndexMembership(names)
}

fn body_rows<'d>(doc: &'d Html, tab: Tab) -> Vec<ElementRef<'d>> {
    let rows = selector(&format!("#{} table tbody tr", tab.anchor()));
    doc.select(&rows).collect()
}

fn extract_reports(
    sel: &Selectors,
    identity: &CompanyIdentity,
    tab: Tab,
    doc: &Html,
) -> Vec<ReportRecord> {
    body_rows(doc, tab)
        .into_iter()
        .filter_map(|row| {
            let first_cell = row.select(&sel.td).next()?;
            let link = first_cell.select(&sel.report_link).next()?;
            let date = element_text(link);
            if date == "Data" {
                return None;
            }
            let href = link.value().attr("href")?;
            Some(ReportRecord {
                company_url: identity.clone(),
                tab,
                date,
                report_url: format!("{SITE_BASE_URL}{href}"),
            })
        })
        .collect()
}

fn extract_shareholders(
    sel: &Selectors,
    identity: &CompanyIdentity,
    doc: &Html,
) -> Vec<ShareholderRecord> {
    body_rows(doc, Tab::Shareholders)
        .into_iter()
        .filter(|row| row.select(&sel.th).next().is_none())
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&sel.td).map(element_text).collect();
            if cells.len() < 5 {
                return None;
            }
            Some(ShareholderRecord {
                company_url: identity.clone(),
                shareholder: cells[0].clone(),
                shares_count: cells[1].clone(),
                shares_pct: cells[2].clone(),
                votes_count: cells[3].clone(),
                votes_pct: cells[4].clone(),
            })
        })
        .collect()
}

fn extract_metrics(sel: &Selectors, identity: &CompanyIdentity, doc: &Html) -> Vec<MetricRecord> {
    body_rows(doc, Tab::Notoria)
        .into_iter()
        .filter_map(|row| {
            let metric = element_text(row.select(&sel.th).next()?);
            let value = element_text(row.select(&sel.td).next()?);
            Some(MetricRecord {
                company_url: identity.clone(),
                metric,
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::CompanyPage;
    use crate::navigator::TabOutcome;

    fn identity() -> CompanyIdentity {
        CompanyIdentity::parse("https://www.gpw.pl/spolka?isin=PLABC0000001").unwrap()
    }

    fn bundle_of(html: &str) -> TabSnapshotBundle {
        let mut bundle = TabSnapshotBundle::default();
        for tab in Tab::ALL {
            bundle.insert(tab, TabOutcome::Captured(html.to_string()));
        }
        bundle
    }

    #[test]
    fn normalize_collapses_nbsp_and_runs() {
        assert_eq!(normalize_text("  1\u{a0}234\u{a0}\u{a0}567 \n zł "), "1 234 567 zł");
        assert_eq!(normalize_text("\u{a0}\t"), "");
    }

    #[test]
    fn reads_labelled_fields_from_each_tab() {
        let html = CompanyPage::new("Example SA", "PLABC0000001")
            .ticker("EXA")
            .sector("banki")
            .last_price("12,34")
            .html();

        let out = extract(&identity(), &bundle_of(&html));

        assert_eq!(out.company.url, identity());
        assert_eq!(out.company.isin, "PLABC0000001");
        assert_eq!(out.company.name.as_deref(), Some("Example SA"));
        assert_eq!(out.company.ticker.as_deref(), Some("EXA"));
        assert_eq!(out.company.sector.as_deref(), Some("banki"));
        assert_eq!(out.company.last_price.as_deref(), Some("12,34"));
        assert_eq!(out.company.full_name, None);
    }

    #[test]
    fn full_name_label_does_not_shadow_name() {
        let html = CompanyPage::new("Example SA", "PLABC0000001")
            .full_name("Example Spółka Akcyjna")
            .html();

        let out = extract(&identity(), &bundle_of(&html));

        assert_eq!(out.company.name.as_deref(), Some("Example SA"));
        assert_eq!(out.company.full_name.as_deref(), Some("Example Spółka Akcyjna"));
    }

    #[test]
    fn labels_are_scoped_to_their_tab_section() {
        let html = r#"<html><body>
            <div id="infoTab"><table><tr><th>Sektor</th><td>wrong</td></tr></table></div>
            <div id="indicatorsTab"><table><tr><th>Sektor</th><td>banki</td></tr></table></div>
        </body></html>"#;

        let out = extract(&identity(), &bundle_of(html));

        assert_eq!(out.company.sector.as_deref(), Some("banki"));
    }

    #[test]
    fn isin_falls_back_to_identity() {
        let out = extract(&identity(), &bundle_of("<html><body></body></html>"));
        assert_eq!(out.company.isin, "PLABC0000001");
        assert!(out.company.index_membership.0.is_empty());
        assert!(out.reports.is_empty());
    }

    #[test]
    fn index_membership_keeps_link_order() {
        let html = CompanyPage::new("Example SA", "PLABC0000001")
            .index("WIG20")
            .index("WIG")
            .html();

        let out = extract(&identity(), &bundle_of(&html));

        assert_eq!(out.company.index_membership.to_column(), "WIG20,WIG");
    }

    #[test]
    fn repeated_index_links_are_kept_once() {
        let html = CompanyPage::new("Example SA", "PLABC0000001")
            .index("WIG20")
            .index("WIG")
            .index("WIG20")
            .html();

        let out = extract(&identity(), &bundle_of(&html));

        assert_eq!(out.company.index_membership.to_column(), "WIG20,WIG");
    }

    #[test]
    fn reports_skip_header_and_rows_without_links() {
        let html = r#"<html><body><div id="reportsTab1"><table>
            <tbody>
              <tr><td><a href="komunikat?geru_id=0">Data</a></td></tr>
              <tr><td>2024-01-01</td><td>no link</td></tr>
              <tr><td><a href="komunikat?geru_id=1">2024-03-01</a></td><td>Raport</td></tr>
              <tr><td>x</td><td><a href="komunikat?geru_id=2">second cell</a></td></tr>
            </tbody></table></div></body></html>"#;

        let out = extract(&identity(), &bundle_of(html));

        assert_eq!(out.reports.len(), 1);
        assert_eq!(out.reports[0].tab, Tab::Reports1);
        assert_eq!(out.reports[0].date, "2024-03-01");
        assert_eq!(
            out.reports[0].report_url,
            "https://www.gpw.pl/komunikat?geru_id=1"
        );
    }

    #[test]
    fn shareholders_need_five_cells_and_no_header() {
        let html = r#"<html><body><div id="shareholdersTab"><table><tbody>
            <tr><th>Akcjonariusz</th><td>a</td><td>b</td><td>c</td><td>d</td></tr>
            <tr><td>Skarb Państwa</td><td>1&nbsp;000</td><td>10,00%</td><td>1&nbsp;000</td><td>10,00%</td></tr>
            <tr><td>short</td><td>1</td></tr>
        </tbody></table></div></body></html>"#;

        let out = extract(&identity(), &bundle_of(html));

        assert_eq!(out.shareholders.len(), 1);
        assert_eq!(out.shareholders[0].shareholder, "Skarb Państwa");
        assert_eq!(out.shareholders[0].shares_count, "1 000");
        assert_eq!(out.shareholders[0].votes_pct, "10,00%");
    }

    #[test]
    fn metrics_need_header_and_value() {
        let html = CompanyPage::new("Example SA", "PLABC0000001")
            .metric("ROE", "12,3")
            .metric("ROA", "1\u{a0}2")
            .html();

        let out = extract(&identity(), &bundle_of(&html));

        let pairs: Vec<_> = out
            .metrics
            .iter()
            .map(|m| (m.metric.as_str(), m.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("ROE", "12,3"), ("ROA", "1 2")]);
    }

    #[test]
    fn degraded_snapshot_is_still_parsed() {
        let html = CompanyPage::new("Example SA", "PLABC0000001")
            .shareholder("Fundusz", "5", "5,00%", "5", "5,00%")
            .html();
        let mut bundle = bundle_of(&html);
        bundle.insert(
            Tab::Shareholders,
            TabOutcome::Degraded {
                snapshot: html.clone(),
                cause: "timeout".to_string(),
            },
        );

        let out = extract(&identity(), &bundle);

        assert_eq!(out.shareholders.len(), 1);
    }
}
