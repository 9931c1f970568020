use std::sync::Arc;

use typed_builder::TypedBuilder;

use gpw_store::Store;

use crate::staleness::StalenessLog;
use crate::traits::PageSource;

/// Long-lived resources shared by every scrape in a batch. Cheap to clone.
#[derive(Clone, TypedBuilder)]
pub struct ScrapeDeps {
    pub pages: Arc<dyn PageSource>,
    pub store: Store,
    pub staleness: Arc<StalenessLog>,
    #[builder(default = 1)]
    pub concurrency_limit: usize,
}
