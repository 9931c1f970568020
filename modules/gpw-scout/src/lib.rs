pub mod deps;
pub mod error;
pub mod extractor;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod inputs;
pub mod navigator;
pub mod scheduler;
pub mod staleness;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use deps::ScrapeDeps;
pub use error::ScrapeError;
pub use scheduler::{BatchReport, ScrapeScheduler};
pub use task::{CompanyScrapeTask, Outcome};
