use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Reason recorded on a plan whose destination already exists at planning time.
pub const CONFLICT_DESTINATION_EXISTS: &str = "destination file already exists";

/// Media classification of a scanned file.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    #[value(name = "tv")]
    TvShow,
    Music,
    #[value(skip)]
    Unknown,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaType::Movie => "movie",
            MediaType::TvShow => "tv",
            MediaType::Music => "music",
            MediaType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Metadata extracted for one file. Opaque to the execution layer; only the
/// naming collaborator reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub artist: Option<String>,
}

/// Kind of relocation a plan proposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Move,
}

/// A proposed, not yet applied relocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub media_type: MediaType,
    pub metadata: Metadata,
    pub kind: OperationKind,
    /// Destination existed when the plan was made.
    pub conflict: bool,
    pub conflict_reason: Option<String>,
}

impl Plan {
    /// A move plan with no metadata, probing the destination for a conflict.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        let destination = destination.into();
        let mut plan = Self {
            source: source.into(),
            destination,
            media_type: MediaType::Unknown,
            metadata: Metadata::default(),
            kind: OperationKind::Move,
            conflict: false,
            conflict_reason: None,
        };
        plan.refresh_conflict();
        plan
    }

    /// Re-stat the destination and set or clear the conflict flag.
    pub fn refresh_conflict(&mut self) {
        if path_occupied(&self.destination) {
            self.conflict = true;
            self.conflict_reason = Some(CONFLICT_DESTINATION_EXISTS.to_string());
        } else {
            self.clear_conflict();
        }
    }

    pub fn clear_conflict(&mut self) {
        self.conflict = false;
        self.conflict_reason = None;
    }
}

/// True when anything, including a dangling symlink, sits at `path`.
pub fn path_occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// How conflicting plans are handled.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Leave the conflicting file where it is.
    #[default]
    Skip,
    /// Move to the first free `<base>-<n><ext>` name.
    Rename,
    /// Ask the operator per conflicting file before execution.
    Interactive,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Rename => "rename",
            ConflictStrategy::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

/// Operation type recorded in the journal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Move,
    CreateFile,
}

/// Per-operation status. Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationStatus::Pending => "pending",
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Record of one attempted (or simulated) relocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Operation {
    pub fn pending_move(source: &Path, destination: &Path) -> Self {
        Self {
            kind: OperationType::Move,
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            status: OperationStatus::Pending,
            error: None,
        }
    }
}

/// Top-level transaction status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RolledBack,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::InProgress => "in_progress",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// Durable record of one journaled execution run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    /// Unset until the run is finalized.
    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Append-only, in execution order.
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn begin(id: String) -> Self {
        Self {
            id,
            status: TransactionStatus::InProgress,
            timestamp: Utc::now(),
            completed: None,
            error: None,
            operations: Vec::new(),
        }
    }

    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations.iter().filter(|op| op.status == status).count()
    }
}

/// Generate JSON Schema for the persisted Transaction record.
pub fn generate_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(Transaction);
    serde_json::to_string_pretty(&schema)
}
