// Company URL list loading.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use gpw_common::CompanyIdentity;

/// Parse a URL list: one URL per line, optional `url` header, blank lines
/// ignored. A trailing CSV column or surrounding quotes are tolerated.
/// Duplicates keep their first position; unparseable lines are logged.
pub fn parse_identities(text: &str) -> Vec<CompanyIdentity> {
    let mut seen = HashSet::new();
    let mut identities = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let raw = line.split(',').next().unwrap_or_default().trim().trim_matches('"');
        if raw.is_empty() || (i == 0 && raw.eq_ignore_ascii_case("url")) {
            continue;
        }
        match CompanyIdentity::parse(raw) {
            Ok(identity) => {
                if seen.insert(identity.clone()) {
                    identities.push(identity);
                }
            }
            Err(e) => warn!(line = i + 1, error = %e, "Skipping URL list entry"),
        }
    }

    identities
}

/// Keep identities matching any filter, by ISIN or by URL. No filters keeps
/// everything. Filters that are valid URLs not in the list are appended.
pub fn select_only(identities: Vec<CompanyIdentity>, only: &[String]) -> Vec<CompanyIdentity> {
    if only.is_empty() {
        return identities;
    }

    let matches = |id: &CompanyIdentity, filter: &str| {
        id.isin().is_some_and(|isin| isin.eq_ignore_ascii_case(filter))
            || CompanyIdentity::parse(filter).is_ok_and(|f| &f == id)
    };

    let mut selected: Vec<CompanyIdentity> = identities
        .into_iter()
        .filter(|id| only.iter().any(|f| matches(id, f)))
        .collect();

    for filter in only {
        if filter.contains("isin=") {
            if let Ok(id) = CompanyIdentity::parse(filter) {
                if !selected.contains(&id) {
                    selected.push(id);
                }
            }
        }
    }
    selected
}

pub async fn load_identities(path: &Path) -> std::io::Result<Vec<CompanyIdentity>> {
    let text = tokio::fs::read_to_string(path).await?;
    let identities = parse_identities(&text);
    info!(path = %path.display(), companies = identities.len(), "Loaded company URLs");
    Ok(identities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_and_blank_lines() {
        let text = "url\nhttps://www.gpw.pl/spolka?isin=PLABC0000001\n\n  \nspolka?isin=PLXYZ0000001\n";

        let ids = parse_identities(text);

        assert_eq!(ids.len(), 2);
        assert_eq!(ids[1].as_str(), "https://www.gpw.pl/spolka?isin=PLXYZ0000001");
    }

    #[test]
    fn dedups_preserving_first_seen_order() {
        let text = "spolka?isin=B\nspolka?isin=A\nhttps://www.gpw.pl/spolka?isin=B\n";

        let ids = parse_identities(text);

        let isins: Vec<_> = ids.iter().filter_map(|id| id.isin()).collect();
        assert_eq!(isins, vec!["B", "A"]);
    }

    #[test]
    fn invalid_lines_are_skipped() {
        let text = "ftp://example.com/file\n\"https://www.gpw.pl/spolka?isin=PLABC0000001\",extra\n";

        let ids = parse_identities(text);

        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].isin().as_deref(), Some("PLABC0000001"));
    }

    #[test]
    fn only_filters_by_isin_or_url() {
        let ids = parse_identities("spolka?isin=PLAAA0000001\nspolka?isin=PLBBB0000001\n");

        let by_isin = select_only(ids.clone(), &["plbbb0000001".to_string()]);
        assert_eq!(by_isin, vec![ids[1].clone()]);

        let by_url = select_only(ids.clone(), &["spolka?isin=PLCCC0000001".to_string()]);
        assert_eq!(by_url.len(), 1);
        assert_eq!(by_url[0].isin().as_deref(), Some("PLCCC0000001"));

        assert_eq!(select_only(ids.clone(), &[]), ids);
    }

    #[tokio::test]
    async fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("company_urls.csv");
        std::fs::write(&path, "url\nspolka?isin=PLABC0000001\n").unwrap();

        let ids = load_identities(&path).await.unwrap();

        assert_eq!(ids.len(), 1);
    }
}
