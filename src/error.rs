use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the planning, execution and journal layers.
#[derive(Debug, Error)]
pub enum RelocError {
    /// The transaction record is absent, unreadable, corrupt, or the ID is malformed.
    #[error("transaction {id} not found: {reason}")]
    TransactionNotFound { id: String, reason: String },

    #[error("transaction {0} already rolled back")]
    AlreadyRolledBack(String),

    #[error("no free rename candidate for {} after {attempts} attempts", .path.display())]
    RenameExhausted { path: PathBuf, attempts: u32 },

    /// Persisting the journal failed; execution halts at this point.
    #[error("journal write failed for transaction {id}: {source}")]
    Journal {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rollback of transaction {id} incomplete: {} file(s) not restored", .failures.len())]
    RollbackIncomplete {
        id: String,
        failures: Vec<RollbackFailure>,
    },

    #[error("no transaction has been started")]
    NoActiveTransaction,

    #[error("dry-run executions are not journaled")]
    DryRunNotJournaled,

    #[error("destination root must be an absolute path: {}", .0.display())]
    InvalidDestinationRoot(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One Move entry that rollback could not put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub error: String,
}

impl fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {}",
            self.destination.display(),
            self.source.display(),
            self.error
        )
    }
}

pub type Result<T, E = RelocError> = std::result::Result<T, E>;
