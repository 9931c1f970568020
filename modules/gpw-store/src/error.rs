use gpw_common::CompanyIdentity;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Row for {found} passed to a replace of {expected} in {table}")]
    KeyMismatch {
        table: &'static str,
        expected: CompanyIdentity,
        found: CompanyIdentity,
    },
}
