use thiserror::Error;

use dbscrub_core::SqlError;

/// Errors that abort a single scramble operation.
#[derive(Debug, Error)]
pub enum ScrambleError {
    /// The table is too large for the static prime table.
    #[error("no prime above {after} in the prime table; too many rows to scramble")]
    NoPrimeFound { after: u64 },
    #[error("invalid scramble request: {0}")]
    InvalidRequest(String),
    /// Shutdown was requested before the rows were rewritten.
    #[error("scramble interrupted")]
    Interrupted,
    #[error(transparent)]
    Db(#[from] SqlError),
}
