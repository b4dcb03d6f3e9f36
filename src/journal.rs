//! Durable storage for transaction records.
//!
//! One pretty-printed JSON file per transaction, `<log_dir>/<id>.json`. Each
//! save goes through a synced temp file in the same directory and an atomic
//! rename, so a reader sees either the previous record or the new one.

use crate::error::{RelocError, Result};
use crate::model::Transaction;
use chrono::Utc;
use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const RECORD_EXT: &str = "json";

/// Allocate a new transaction ID: UTC timestamp plus 8 random hex chars.
/// IDs sort lexicographically by creation time.
pub fn new_transaction_id() -> String {
    let suffix = hex::encode(&Uuid::new_v4().as_bytes()[..4]);
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"), suffix)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Directory of transaction records.
#[derive(Debug, Clone)]
pub struct JournalStore {
    dir: PathBuf,
}

impl JournalStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXT}"))
    }

    /// Persist the full record, replacing any previous version.
    pub fn save(&self, txn: &Transaction) -> Result<()> {
        self.write_record(txn).map_err(|source| RelocError::Journal {
            id: txn.id.clone(),
            source,
        })
    }

    fn write_record(&self, txn: &Transaction) -> std::io::Result<()> {
        let mut staged = tempfile::Builder::new()
            .prefix(".txn.")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        serde_json::to_writer_pretty(staged.as_file_mut(), txn)?;
        writeln!(staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        staged.persist(self.path_for(&txn.id)).map_err(|e| e.error)?;
        sync_dir(&self.dir);
        Ok(())
    }

    /// Load a record. Absent, unreadable or corrupt records are all NotFound.
    pub fn load(&self, id: &str) -> Result<Transaction> {
        let not_found = |reason: String| RelocError::TransactionNotFound {
            id: id.to_string(),
            reason,
        };
        if !is_valid_id(id) {
            return Err(not_found("malformed transaction id".to_string()));
        }
        let file = fs::File::open(self.path_for(id)).map_err(|e| not_found(e.to_string()))?;
        let txn: Transaction = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| not_found(format!("corrupt record: {e}")))?;
        if txn.id != id {
            return Err(not_found(format!("record holds transaction {}", txn.id)));
        }
        Ok(txn)
    }

    /// Every persisted transaction ID, oldest first.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str())
                && is_valid_id(id)
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Operation, OperationStatus, TransactionStatus};

    #[test]
    fn ids_are_unique_and_time_ordered() {
        let a = new_transaction_id();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = new_transaction_id();
        assert_ne!(a, b);
        assert!(a < b);
        assert!(is_valid_id(&a));
    }

    #[test]
    fn save_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path().join("txns")).unwrap();

        let mut txn = Transaction::begin(new_transaction_id());
        let mut op = Operation::pending_move(Path::new("/a"), Path::new("/b"));
        op.status = OperationStatus::Completed;
        txn.operations.push(op);
        store.save(&txn).unwrap();

        txn.status = TransactionStatus::Completed;
        store.save(&txn).unwrap();

        let loaded = store.load(&txn.id).unwrap();
        assert_eq!(loaded, txn);
        assert_eq!(store.list().unwrap(), vec![txn.id.clone()]);
    }

    #[test]
    fn list_ignores_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).unwrap();
        fs::write(dir.path().join(".txn.abc.tmp"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn absent_corrupt_and_malformed_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.load("20260101T000000.000Z-00000000"),
            Err(RelocError::TransactionNotFound { .. })
        ));

        fs::write(store.path_for("broken"), "{ not json").unwrap();
        assert!(matches!(
            store.load("broken"),
            Err(RelocError::TransactionNotFound { .. })
        ));

        assert!(matches!(
            store.load("../escape"),
            Err(RelocError::TransactionNotFound { .. })
        ));
    }
}
