use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structured event emitted during organize and rollback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Planned {
        files: usize,
        plans: usize,
        conflicts: usize,
    },
    ValidationFailed {
        error: String,
    },
    OpCompleted {
        src: PathBuf,
        dst: PathBuf,
        dry_run: bool,
    },
    OpFailed {
        src: PathBuf,
        dst: PathBuf,
        error: String,
    },
    OpSkipped {
        src: PathBuf,
        dst: PathBuf,
        reason: String,
    },
    TxnCommitted {
        transaction_id: String,
    },
    TxnHalted {
        transaction_id: Option<String>,
        error: String,
    },
    RollbackCompleted {
        transaction_id: String,
        restored: usize,
    },
    RollbackIncomplete {
        transaction_id: String,
        /// `destination -> source: error` per file left in place.
        not_restored: Vec<String>,
    },
}
