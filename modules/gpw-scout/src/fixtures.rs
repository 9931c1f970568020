// Synthetic GPW company pages for tests.
//
// Mirrors the structure the extractor reads: one `#<anchor>` section per tab,
// label/value rows as `<th>`/`<td>` pairs.

use gpw_common::Tab;

#[derive(Debug, Clone, Default)]
pub struct CompanyPage {
    name: String,
    isin: String,
    description: Option<String>,
    info: Vec<(String, String)>,
    indicators: Vec<(String, String)>,
    quotations: Vec<(String, String)>,
    indexes: Vec<String>,
    reports: Vec<(Tab, String, String)>,
    shareholders: Vec<[String; 5]>,
    metrics: Vec<(String, String)>,
    omitted: Vec<Tab>,
}

impl CompanyPage {
    pub fn new(name: &str, isin: &str) -> Self {
        Self {
            name: name.to_string(),
            isin: isin.to_string(),
            ..Default::default()
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn info(mut self, label: &str, value: &str) -> Self {
        self.info.push((label.to_string(), value.to_string()));
        self
    }

    pub fn indicator(mut self, label: &str, value: &str) -> Self {
        self.indicators.push((label.to_string(), value.to_string()));
        self
    }

    pub fn quotation(mut self, label: &str, value: &str) -> Self {
        self.quotations.push((label.to_string(), value.to_string()));
        self
    }

    pub fn ticker(self, ticker: &str) -> Self {
        self.info("Skrót:", ticker)
    }

    pub fn full_name(self, full_name: &str) -> Self {
        self.info("Nazwa pełna:", full_name)
    }

    pub fn sector(self, sector: &str) -> Self {
        self.indicator("Sektor", sector)
    }

    pub fn last_price(self, price: &str) -> Self {
        self.quotation("Kurs ostatni", price)
    }

    pub fn index(mut self, name: &str) -> Self {
        self.indexes.push(name.to_string());
        self
    }

    /// Report row in `tab` (Reports1 or Reports2) linking to `komunikat?geru_id=<id>`.
    pub fn report(mut self, tab: Tab, date: &str, id: u32) -> Self {
        self.reports
            .push((tab, date.to_string(), format!("komunikat?geru_id={id}")));
        self
    }

    pub fn shareholder(
        mut self,
        name: &str,
        shares: &str,
        shares_pct: &str,
        votes: &str,
        votes_pct: &str,
    ) -> Self {
        self.shareholders.push([
            name.to_string(),
            shares.to_string(),
            shares_pct.to_string(),
            votes.to_string(),
            votes_pct.to_string(),
        ]);
        self
    }

    pub fn metric(mut self, metric: &str, value: &str) -> Self {
        self.metrics.push((metric.to_string(), value.to_string()));
        self
    }

    /// Leave `tab` out of the page entirely, link and section.
    pub fn without(mut self, tab: Tab) -> Self {
        self.omitted.push(tab);
        self
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn omitted(&self) -> &[Tab] {
        &self.omitted
    }

    pub fn html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html><html><head><title>");
        out.push_str(&self.name);
        out.push_str("</title></head><body>\n<ul class=\"nav\">\n");
        for tab in Tab::ALL.into_iter().filter(|t| self.has(*t)) {
            out.push_str(&format!(
                "<li><a class=\"nav-link\" href=\"#{}\">{}</a></li>\n",
                tab.anchor(),
                tab
            ));
        }
        out.push_str("</ul>\n");

        if let Some(ref text) = self.description {
            out.push_str(&format!(
                "<div class=\"comapny-description\"><div>Opis</div><div>{text}</div></div>\n"
            ));
        }

        let mut info = vec![("Nazwa:".to_string(), self.name.clone())];
        info.extend(self.info.iter().cloned());
        self.push_labelled(&mut out, Tab::Info, &info, "");

        let mut indicators = vec![("ISIN".to_string(), self.isin.clone())];
        indicators.extend(self.indicators.iter().cloned());
        self.push_labelled(&mut out, Tab::Indicators, &indicators, "");

        let index_row = if self.indexes.is_empty() {
            String::new()
        } else {
            let links: Vec<String> = self
                .indexes
                .iter()
                .map(|name| format!("<a href=\"indeks?isin={name}\">{name}</a>"))
                .collect();
            format!(
                "<tr><th>Przynależność do indeksu</th><td>{}</td></tr>\n",
                links.join(", ")
            )
        };
        self.push_labelled(&mut out, Tab::Quotations, &self.quotations, &index_row);

        for tab in [Tab::Reports1, Tab::Reports2] {
            let rows: String = self
                .reports
                .iter()
                .filter(|(t, _, _)| *t == tab)
                .map(|(_, date, href)| {
                    format!("<tr><td><a href=\"{href}\">{date}</a></td><td>Raport bieżący</td></tr>\n")
                })
                .collect();
            self.push_table(
                &mut out,
                tab,
                "<thead><tr><th>Data</th><th>Tytuł</th></tr></thead>",
                &rows,
            );
        }

        let rows: String = self
            .shareholders
            .iter()
            .map(|cells| {
                let tds: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
                format!("<tr>{tds}</tr>\n")
            })
            .collect();
        self.push_table(
            &mut out,
            Tab::Shareholders,
            "<thead><tr><th>Akcjonariusz</th><th>Liczba akcji</th><th>Udział</th>\
             <th>Liczba głosów</th><th>Udział w głosach</th></tr></thead>",
            &rows,
        );

        let rows: String = self
            .metrics
            .iter()
            .map(|(metric, value)| format!("<tr><th>{metric}</th><td>{value}</td></tr>\n"))
            .collect();
        self.push_table(&mut out, Tab::Notoria, "", &rows);

        out.push_str("</body></html>\n");
        out
    }

    fn has(&self, tab: Tab) -> bool {
        !self.omitted.contains(&tab)
    }

    fn push_labelled(&self, out: &mut String, tab: Tab, rows: &[(String, String)], extra: &str) {
        let body: String = rows
            .iter()
            .map(|(label, value)| format!("<tr><th>{label}</th><td>{value}</td></tr>\n"))
            .collect();
        self.push_table(out, tab, "", &format!("{body}{extra}"));
    }

    fn push_table(&self, out: &mut String, tab: Tab, head: &str, body: &str) {
        if !self.has(tab) {
            return;
        }
        out.push_str(&format!(
            "<div id=\"{}\" class=\"tab-pane\"><table>{head}<tbody>\n{body}</tbody></table></div>\n",
            tab.anchor()
        ));
    }
}
