//! Error types for kestrel_irgen.
//!
//! Emission itself never fails recoverably: a broken lowering invariant is a
//! bug in the caller or in this crate and panics. Only configuration loading
//! and module finishing return errors.

pub type Result<T> = std::result::Result<T, IrGenError>;

#[derive(Debug, thiserror::Error)]
pub enum IrGenError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IR verification failed for @{function}:\n{report}")]
    Verify { function: String, report: String },
}
