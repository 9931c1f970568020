use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpwError {
    #[error("Invalid company identity {raw:?}: {reason}")]
    InvalidIdentity { raw: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
