// Tab navigation for one company page.
//
// Start -> PageLoaded -> DescriptionCaptured -> TabCaptured(Info)
//       -> TabCaptured(t) for each t in TAB_ORDER -> Done
//
// Tab failures degrade that tab and move on. Only a failed initial load or a
// failed content read stops the walk.

use std::collections::BTreeMap;
use std::time::Duration;

use gpw_common::{CompanyIdentity, Tab};
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::extractor::normalize_text;
use crate::traits::PageSession;

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DESCRIPTION_TIMEOUT: Duration = Duration::from_secs(3);
pub const TAB_CLICK_TIMEOUT: Duration = Duration::from_secs(15);
pub const TAB_CONTENT_TIMEOUT: Duration = Duration::from_secs(5);

/// The site's own class name is misspelled.
pub const DESCRIPTION_SELECTOR: &str = "div.comapny-description > div:nth-child(2)";

/// Tabs activated after the info snapshot, in click order.
pub const TAB_ORDER: [Tab; 6] = [
    Tab::Indicators,
    Tab::Quotations,
    Tab::Reports1,
    Tab::Reports2,
    Tab::Shareholders,
    Tab::Notoria,
];

/// Selector of the nav link that activates `tab`.
pub fn tab_control_selector(tab: Tab) -> String {
    format!(r##"a.nav-link[href="#{}"]"##, tab.anchor())
}

/// Selector that matches once `tab` has rendered its table.
pub fn tab_content_selector(tab: Tab) -> String {
    format!("#{} table", tab.anchor())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Start,
    PageLoaded,
    DescriptionCaptured,
    TabCaptured(Tab),
    Done,
}

/// Page snapshot taken for one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabOutcome {
    Captured(String),
    /// Activation failed; `snapshot` is whatever the page held afterwards.
    Degraded { snapshot: String, cause: String },
}

impl TabOutcome {
    pub fn snapshot(&self) -> &str {
        match self {
            TabOutcome::Captured(html) => html,
            TabOutcome::Degraded { snapshot, .. } => snapshot,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, TabOutcome::Degraded { .. })
    }
}

/// Everything the navigator captured for one company.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSnapshotBundle {
    pub description: Option<String>,
    tabs: BTreeMap<Tab, TabOutcome>,
}

impl TabSnapshotBundle {
    pub fn insert(&mut self, tab: Tab, outcome: TabOutcome) {
        self.tabs.insert(tab, outcome);
    }

    pub fn outcome(&self, tab: Tab) -> Option<&TabOutcome> {
        self.tabs.get(&tab)
    }

    pub fn snapshot(&self, tab: Tab) -> Option<&str> {
        self.tabs.get(&tab).map(TabOutcome::snapshot)
    }

    pub fn degraded_tabs(&self) -> Vec<Tab> {
        self.tabs
            .iter()
            .filter(|(_, outcome)| outcome.is_degraded())
            .map(|(tab, _)| *tab)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

/// Walks one company page through its tabs. Borrowing the page keeps closing
/// it with the caller.
pub struct TabNavigator<'a> {
    page: &'a dyn PageSession,
    identity: &'a CompanyIdentity,
    state: NavState,
    bundle: TabSnapshotBundle,
}

impl<'a> TabNavigator<'a> {
    pub fn new(page: &'a dyn PageSession, identity: &'a CompanyIdentity) -> Self {
        Self {
            page,
            identity,
            state: NavState::Start,
            bundle: TabSnapshotBundle::default(),
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn bundle(&self) -> &TabSnapshotBundle {
        &self.bundle
    }

    /// Drive the walk to `Done` and hand back the snapshots.
    pub async fn run(mut self) -> Result<TabSnapshotBundle, ScrapeError> {
        while self.state != NavState::Done {
            self.step().await?;
        }
        Ok(self.bundle)
    }

    /// Perform one transition.
    pub async fn step(&mut self) -> Result<NavState, ScrapeError> {
        let next = match self.state {
            NavState::Start => {
                self.page
                    .goto(self.identity.as_str(), NAVIGATION_TIMEOUT)
                    .await
                    .map_err(ScrapeError::Navigation)?;
                NavState::PageLoaded
            }
            NavState::PageLoaded => {
                self.bundle.description = self.read_description().await;
                NavState::DescriptionCaptured
            }
            NavState::DescriptionCaptured => {
                let html = self.page.content().await.map_err(ScrapeError::Content)?;
                self.bundle.insert(Tab::Info, TabOutcome::Captured(html));
                NavState::TabCaptured(Tab::Info)
            }
            NavState::TabCaptured(previous) => match next_tab(previous) {
                Some(tab) => {
                    let outcome = self.capture_tab(tab).await?;
                    self.bundle.insert(tab, outcome);
                    NavState::TabCaptured(tab)
                }
                None => NavState::Done,
            },
            NavState::Done => NavState::Done,
        };

        debug!(identity = %self.identity, state = ?next, "Navigator advanced");
        self.state = next;
        Ok(next)
    }

    async fn read_description(&self) -> Option<String> {
        match self
            .page
            .inner_text(DESCRIPTION_SELECTOR, DESCRIPTION_TIMEOUT)
            .await
        {
            Ok(text) => text.map(|t| normalize_text(&t)).filter(|t| !t.is_empty()),
            Err(e) => {
                debug!(identity = %self.identity, error = %e, "No company description");
                None
            }
        }
    }

    async fn capture_tab(&self, tab: Tab) -> Result<TabOutcome, ScrapeError> {
        let activated = match self
            .page
            .click(&tab_control_selector(tab), TAB_CLICK_TIMEOUT)
            .await
        {
            Ok(()) => {
                self.page
                    .wait_for(&tab_content_selector(tab), TAB_CONTENT_TIMEOUT)
                    .await
            }
            Err(e) => Err(e),
        };

        let snapshot = self.page.content().await.map_err(ScrapeError::Content)?;

        Ok(match activated {
            Ok(()) => TabOutcome::Captured(snapshot),
            Err(e) => {
                warn!(
                    identity = %self.identity,
                    tab = %tab,
                    timed_out = e.is_timeout(),
                    error = %e,
                    "Tab degraded"
                );
                TabOutcome::Degraded {
                    snapshot,
                    cause: e.to_string(),
                }
            }
        })
    }
}

fn next_tab(previous: Tab) -> Option<Tab> {
    match TAB_ORDER.iter().position(|t| *t == previous) {
        Some(i) => TAB_ORDER.get(i + 1).copied(),
        None => TAB_ORDER.first().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockSite};
    use crate::traits::PageSource;

    fn identity() -> CompanyIdentity {
        CompanyIdentity::parse("https://www.gpw.pl/spolka?isin=PLABC0000001").unwrap()
    }

    #[test]
    fn tab_order_follows_info() {
        assert_eq!(next_tab(Tab::Info), Some(Tab::Indicators));
        assert_eq!(next_tab(Tab::Reports2), Some(Tab::Shareholders));
        assert_eq!(next_tab(Tab::Notoria), None);
    }

    #[test]
    fn selectors_use_tab_anchors() {
        assert_eq!(
            tab_control_selector(Tab::Shareholders),
            r##"a.nav-link[href="#shareholdersTab"]"##
        );
        assert_eq!(tab_content_selector(Tab::Notoria), "#showNotoria table");
    }

    #[tokio::test]
    async fn walks_every_state_in_order() {
        let id = identity();
        let browser = MockBrowser::new().on_site(&id, MockSite::new("<html></html>"));
        let page = browser.open_page().await.unwrap();
        let mut nav = TabNavigator::new(page.as_ref(), &id);

        let mut states = vec![nav.state()];
        while nav.state() != NavState::Done {
            states.push(nav.step().await.unwrap());
        }

        assert_eq!(states[0], NavState::Start);
        assert_eq!(states[1], NavState::PageLoaded);
        assert_eq!(states[2], NavState::DescriptionCaptured);
        assert_eq!(states[3], NavState::TabCaptured(Tab::Info));
        assert_eq!(states[4], NavState::TabCaptured(Tab::Indicators));
        assert_eq!(states[9], NavState::TabCaptured(Tab::Notoria));
        assert_eq!(states[10], NavState::Done);
        assert_eq!(nav.bundle().len(), 7);
    }

    #[tokio::test]
    async fn failed_tab_is_degraded_and_walk_continues() {
        let id = identity();
        let site = MockSite::new("<html>page</html>").missing_tab(Tab::Shareholders);
        let browser = MockBrowser::new().on_site(&id, site);
        let page = browser.open_page().await.unwrap();

        let bundle = TabNavigator::new(page.as_ref(), &id).run().await.unwrap();

        assert_eq!(bundle.degraded_tabs(), vec![Tab::Shareholders]);
        assert_eq!(bundle.snapshot(Tab::Shareholders), Some("<html>page</html>"));
        assert!(!bundle.outcome(Tab::Notoria).unwrap().is_degraded());
        assert_eq!(bundle.len(), 7);
    }

    #[tokio::test]
    async fn slow_tab_content_degrades_the_tab() {
        let id = identity();
        let site = MockSite::new("<html></html>").slow_tab(Tab::Reports2);
        let browser = MockBrowser::new().on_site(&id, site);
        let page = browser.open_page().await.unwrap();

        let bundle = TabNavigator::new(page.as_ref(), &id).run().await.unwrap();

        assert_eq!(bundle.degraded_tabs(), vec![Tab::Reports2]);
    }

    #[tokio::test]
    async fn failed_load_is_fatal() {
        let id = identity();
        let browser = MockBrowser::new();
        let page = browser.open_page().await.unwrap();

        let err = TabNavigator::new(page.as_ref(), &id).run().await.unwrap_err();

        assert!(matches!(err, ScrapeError::Navigation(_)));
    }

    #[tokio::test]
    async fn content_failure_is_fatal() {
        let id = identity();
        let site = MockSite::new("<html></html>").failing_content();
        let browser = MockBrowser::new().on_site(&id, site);
        let page = browser.open_page().await.unwrap();

        let err = TabNavigator::new(page.as_ref(), &id).run().await.unwrap_err();

        assert!(matches!(err, ScrapeError::Content(_)));
    }

    #[tokio::test]
    async fn description_is_normalized_or_absent() {
        let id = identity();
        let site = MockSite::new("<html></html>").description("  Bank\u{a0}  detaliczny \n");
        let browser = MockBrowser::new().on_site(&id, site);
        let page = browser.open_page().await.unwrap();
        let bundle = TabNavigator::new(page.as_ref(), &id).run().await.unwrap();
        assert_eq!(bundle.description.as_deref(), Some("Bank detaliczny"));

        let browser = MockBrowser::new().on_site(&id, MockSite::new("<html></html>"));
        let page = browser.open_page().await.unwrap();
        let bundle = TabNavigator::new(page.as_ref(), &id).run().await.unwrap();
        assert_eq!(bundle.description, None);
    }
}
