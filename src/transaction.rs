use crate::error::{RelocError, Result, RollbackFailure};
use crate::fsops;
use crate::journal::{JournalStore, new_transaction_id};
use crate::model::{
    Operation, OperationStatus, OperationType, Transaction, TransactionStatus, path_occupied,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Files put back by a successful rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub id: String,
    /// `(destination, source)` pairs, in the order they were reversed.
    pub restored: Vec<(PathBuf, PathBuf)>,
}

/// Owns the journal for one in-flight transaction and serves lookups and
/// rollbacks of persisted ones. Single writer; no locking.
pub struct TransactionManager {
    store: JournalStore,
    current: Option<Transaction>,
}

impl TransactionManager {
    pub fn new(log_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            store: JournalStore::open(log_dir)?,
            current: None,
        })
    }

    pub fn log_dir(&self) -> &Path {
        self.store.dir()
    }

    /// The in-flight transaction, if one has been started.
    pub fn current(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    /// Start a transaction and persist its initial record.
    pub fn begin(&mut self) -> Result<String> {
        let txn = Transaction::begin(new_transaction_id());
        self.store.save(&txn)?;
        info!(id = %txn.id, log_dir = %self.store.dir().display(), "transaction started");
        let id = txn.id.clone();
        self.current = Some(txn);
        Ok(id)
    }

    /// Append an operation and persist. Returns its index for later updates.
    pub fn record_operation(&mut self, op: &Operation) -> Result<usize> {
        let txn = self.current.as_mut().ok_or(RelocError::NoActiveTransaction)?;
        txn.operations.push(op.clone());
        let index = txn.operations.len() - 1;
        self.store.save(txn)?;
        Ok(index)
    }

    /// Overwrite the status and error of a recorded operation and persist.
    pub fn update_operation(&mut self, index: usize, op: &Operation) -> Result<()> {
        let txn = self.current.as_mut().ok_or(RelocError::NoActiveTransaction)?;
        let entry = txn
            .operations
            .get_mut(index)
            .ok_or(RelocError::NoActiveTransaction)?;
        entry.status = op.status;
        entry.error = op.error.clone();
        self.store.save(txn)
    }

    /// Mark the run finished. Per-file failures do not fail the transaction.
    pub fn finalize(&mut self) -> Result<Transaction> {
        let mut txn = self.current.take().ok_or(RelocError::NoActiveTransaction)?;
        txn.status = TransactionStatus::Completed;
        txn.completed = Some(Utc::now());
        self.store.save(&txn)?;
        info!(
            id = %txn.id,
            completed = txn.count(OperationStatus::Completed),
            failed = txn.count(OperationStatus::Failed),
            "transaction finalized"
        );
        Ok(txn)
    }

    /// Best-effort: mark the in-flight transaction Failed after a halt.
    pub fn abort(&mut self, reason: &str) {
        let Some(mut txn) = self.current.take() else {
            return;
        };
        txn.status = TransactionStatus::Failed;
        txn.completed = Some(Utc::now());
        txn.error = Some(reason.to_string());
        if let Err(e) = self.store.save(&txn) {
            error!(id = %txn.id, error = %e, "could not mark transaction failed");
        }
    }

    pub fn load(&self, id: &str) -> Result<Transaction> {
        self.store.load(id)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    /// Reverse every completed move of a persisted transaction, newest first.
    ///
    /// Reversal failures do not stop the walk. The transaction becomes
    /// RolledBack only if every reversible entry was restored; otherwise the
    /// unrestored files are returned in `RollbackIncomplete` and the status
    /// is left as it was.
    pub fn rollback(&self, id: &str) -> Result<RollbackReport> {
        let mut txn = self.store.load(id)?;
        if txn.status == TransactionStatus::RolledBack {
            return Err(RelocError::AlreadyRolledBack(id.to_string()));
        }
        info!(id, operations = txn.operations.len(), "rollback started");

        let mut report = RollbackReport {
            id: id.to_string(),
            restored: Vec::new(),
        };
        let mut failures = Vec::new();
        for op in txn.operations.iter().rev() {
            if op.kind != OperationType::Move {
                continue;
            }
            match op.status {
                OperationStatus::Completed => {}
                // Interrupted mid-move: only reverse if the move evidently happened.
                OperationStatus::InProgress
                    if path_occupied(&op.destination) && !path_occupied(&op.source) => {}
                _ => continue,
            }
            match reverse_move(op) {
                Ok(true) => report
                    .restored
                    .push((op.destination.clone(), op.source.clone())),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        source = %op.source.display(),
                        destination = %op.destination.display(),
                        error = %e,
                        "could not restore file"
                    );
                    failures.push(RollbackFailure {
                        source: op.source.clone(),
                        destination: op.destination.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            txn.status = TransactionStatus::RolledBack;
            txn.error = None;
            self.store.save(&txn)?;
            info!(id, restored = report.restored.len(), "rollback complete");
            Ok(report)
        } else {
            txn.error = Some(format!(
                "rollback incomplete: {} file(s) not restored",
                failures.len()
            ));
            if let Err(e) = self.store.save(&txn) {
                error!(id, error = %e, "could not record rollback failure");
            }
            error!(id, failed = failures.len(), "rollback incomplete");
            Err(RelocError::RollbackIncomplete {
                id: id.to_string(),
                failures,
            })
        }
    }
}

/// Move one file back. `Ok(false)` means it was already back in place.
fn reverse_move(op: &Operation) -> std::io::Result<bool> {
    if !path_occupied(&op.destination) && path_occupied(&op.source) {
        return Ok(false);
    }
    fsops::move_file(&op.destination, &op.source)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn completed(src: &Path, dst: &Path) -> Operation {
        let mut op = Operation::pending_move(src, dst);
        op.status = OperationStatus::Completed;
        op
    }

    #[test]
    fn every_status_change_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = TransactionManager::new(dir.path()).unwrap();
        let id = mgr.begin().unwrap();

        let initial = mgr.load(&id).unwrap();
        assert_eq!(initial.status, TransactionStatus::InProgress);
        assert!(initial.operations.is_empty());
        assert!(initial.completed.is_none());

        let mut op = Operation::pending_move(Path::new("/s"), Path::new("/d"));
        let index = mgr.record_operation(&op).unwrap();
        assert_eq!(
            mgr.load(&id).unwrap().operations[0].status,
            OperationStatus::Pending
        );

        op.status = OperationStatus::Failed;
        op.error = Some("boom".into());
        mgr.update_operation(index, &op).unwrap();
        let stored = mgr.load(&id).unwrap();
        assert_eq!(stored.operations[0].status, OperationStatus::Failed);
        assert_eq!(stored.operations[0].error.as_deref(), Some("boom"));

        let done = mgr.finalize().unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);
        assert!(mgr.load(&id).unwrap().completed.is_some());
        assert!(mgr.current().is_none());
    }

    #[test]
    fn record_without_begin_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = TransactionManager::new(dir.path()).unwrap();
        let op = Operation::pending_move(Path::new("/s"), Path::new("/d"));
        assert!(matches!(
            mgr.record_operation(&op),
            Err(RelocError::NoActiveTransaction)
        ));
    }

    #[test]
    fn abort_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = TransactionManager::new(dir.path()).unwrap();
        let id = mgr.begin().unwrap();
        mgr.abort("disk full");
        let txn = mgr.load(&id).unwrap();
        assert_eq!(txn.status, TransactionStatus::Failed);
        assert_eq!(txn.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn rollback_reverses_in_reverse_order_and_is_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut mgr = TransactionManager::new(root.join("log")).unwrap();
        let id = mgr.begin().unwrap();

        fs::write(root.join("b"), "A").unwrap();
        fs::write(root.join("c"), "C").unwrap();
        mgr.record_operation(&completed(&root.join("a"), &root.join("b")))
            .unwrap();
        mgr.record_operation(&completed(&root.join("c"), &root.join("d")))
            .unwrap();
        fs::rename(root.join("c"), root.join("d")).unwrap();
        mgr.finalize().unwrap();

        let report = mgr.rollback(&id).unwrap();
        assert_eq!(
            report.restored,
            vec![
                (root.join("d"), root.join("c")),
                (root.join("b"), root.join("a")),
            ]
        );
        assert_eq!(fs::read_to_string(root.join("a")).unwrap(), "A");
        assert_eq!(fs::read_to_string(root.join("c")).unwrap(), "C");
        assert_eq!(
            mgr.load(&id).unwrap().status,
            TransactionStatus::RolledBack
        );

        // Second attempt fails and touches nothing.
        fs::write(root.join("b"), "unrelated").unwrap();
        let err = mgr.rollback(&id).unwrap_err();
        assert!(matches!(err, RelocError::AlreadyRolledBack(_)));
        assert!(err.to_string().contains("already rolled back"));
        assert_eq!(fs::read_to_string(root.join("b")).unwrap(), "unrelated");
        assert_eq!(fs::read_to_string(root.join("a")).unwrap(), "A");
    }

    #[test]
    fn partial_rollback_reports_files_and_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut mgr = TransactionManager::new(root.join("log")).unwrap();
        let id = mgr.begin().unwrap();

        fs::write(root.join("moved1"), "1").unwrap();
        fs::write(root.join("moved2"), "2").unwrap();
        mgr.record_operation(&completed(&root.join("orig1"), &root.join("moved1")))
            .unwrap();
        mgr.record_operation(&completed(&root.join("orig2"), &root.join("moved2")))
            .unwrap();
        mgr.finalize().unwrap();

        // Something now occupies orig1, so it cannot be restored.
        fs::write(root.join("orig1"), "squatter").unwrap();
        match mgr.rollback(&id) {
            Err(RelocError::RollbackIncomplete { failures, .. }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].source, root.join("orig1"));
                assert_eq!(failures[0].destination, root.join("moved1"));
            }
            other => panic!("expected RollbackIncomplete, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(root.join("orig2")).unwrap(), "2");
        assert_eq!(fs::read_to_string(root.join("orig1")).unwrap(), "squatter");
        let txn = mgr.load(&id).unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert!(txn.error.is_some());

        // Clear the obstruction and retry; orig2 is recognised as already restored.
        fs::remove_file(root.join("orig1")).unwrap();
        let report = mgr.rollback(&id).unwrap();
        assert_eq!(report.restored, vec![(root.join("moved1"), root.join("orig1"))]);
        assert_eq!(fs::read_to_string(root.join("orig1")).unwrap(), "1");
        assert_eq!(
            mgr.load(&id).unwrap().status,
            TransactionStatus::RolledBack
        );
    }

    #[test]
    fn in_progress_entries_are_reversed_only_when_moved() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut mgr = TransactionManager::new(root.join("log")).unwrap();
        let id = mgr.begin().unwrap();

        // Crashed after rename, before status was persisted.
        fs::write(root.join("landed"), "L").unwrap();
        let mut moved = Operation::pending_move(&root.join("from1"), &root.join("landed"));
        moved.status = OperationStatus::InProgress;
        mgr.record_operation(&moved).unwrap();

        // Crashed before rename.
        fs::write(root.join("from2"), "S").unwrap();
        let mut not_moved = Operation::pending_move(&root.join("from2"), &root.join("never"));
        not_moved.status = OperationStatus::InProgress;
        mgr.record_operation(&not_moved).unwrap();

        let report = mgr.rollback(&id).unwrap();
        assert_eq!(report.restored, vec![(root.join("landed"), root.join("from1"))]);
        assert_eq!(fs::read_to_string(root.join("from1")).unwrap(), "L");
        assert_eq!(fs::read_to_string(root.join("from2")).unwrap(), "S");
    }

    #[test]
    fn rollback_of_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = TransactionManager::new(dir.path()).unwrap();
        assert!(matches!(
            mgr.rollback("20260101T000000.000Z-00000000"),
            Err(RelocError::TransactionNotFound { .. })
        ));
    }
}
