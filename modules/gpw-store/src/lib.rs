pub mod error;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use record::TableRecord;
pub use store::Store;
