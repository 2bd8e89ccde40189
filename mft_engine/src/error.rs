//! Error kinds shared across the statistics, bootstrap, and position-analytics
//! modules. One closed enum rather than a per-subsystem exception hierarchy —
//! every fallible call in this crate returns `Result<T, StatError>`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("degenerate replicates: {skipped}/{total} skipped (max fraction {max_fraction})")]
    DegenerateReplicates {
        skipped: usize,
        total: usize,
        max_fraction: f64,
    },

    #[error("domain violation: {0}")]
    Domain(String),

    #[error("overflow: {0}")]
    Overflow(String),
}

pub type StatResult<T> = Result<T, StatError>;
