//! Applies plans to the filesystem, one move at a time, in plan order.

use crate::conflict::{self, DEFAULT_MAX_RENAME_ATTEMPTS};
use crate::error::{RelocError, Result};
use crate::fsops;
use crate::model::{ConflictStrategy, Operation, OperationStatus, Plan};
use crate::transaction::TransactionManager;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Simulate: operations are marked Completed without touching disk or journal.
    pub dry_run: bool,
    pub max_rename_attempts: u32,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_rename_attempts: DEFAULT_MAX_RENAME_ATTEMPTS,
        }
    }
}

/// A plan that produced no operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPlan {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

pub struct Executor {
    options: ExecuteOptions,
    skipped: Vec<SkippedPlan>,
}

impl Executor {
    pub fn new(options: ExecuteOptions) -> Self {
        Self {
            options,
            skipped: Vec::new(),
        }
    }

    pub fn options(&self) -> ExecuteOptions {
        self.options
    }

    /// Plans left out by the most recent run.
    pub fn skipped(&self) -> &[SkippedPlan] {
        &self.skipped
    }

    /// Execute without a journal.
    pub fn execute(&mut self, plans: &[Plan], strategy: ConflictStrategy) -> Result<Vec<Operation>> {
        self.run(plans, strategy, None)
    }

    /// Execute under a new journaled transaction.
    ///
    /// Each status change is persisted before the operation is returned. A
    /// journal write failure halts the run; the error carries the transaction
    /// ID so the completed prefix can still be rolled back.
    pub fn execute_with_transaction(
        &mut self,
        manager: &mut TransactionManager,
        plans: &[Plan],
        strategy: ConflictStrategy,
    ) -> Result<(String, Vec<Operation>)> {
        if self.options.dry_run {
            return Err(RelocError::DryRunNotJournaled);
        }
        let id = manager.begin()?;
        match self.run(plans, strategy, Some(&mut *manager)) {
            Ok(operations) => {
                manager.finalize()?;
                Ok((id, operations))
            }
            Err(e) => {
                error!(id = %id, error = %e, "execution halted");
                manager.abort(&e.to_string());
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        plans: &[Plan],
        strategy: ConflictStrategy,
        mut journal: Option<&mut TransactionManager>,
    ) -> Result<Vec<Operation>> {
        self.skipped.clear();
        let mut operations = Vec::with_capacity(plans.len());

        for plan in plans {
            let Some(destination) = self.destination_for(plan, strategy) else {
                continue;
            };
            let mut op = Operation::pending_move(&plan.source, &destination);

            if self.options.dry_run {
                debug!(source = %op.source.display(), destination = %op.destination.display(), "dry-run move");
                op.status = OperationStatus::Completed;
                operations.push(op);
                continue;
            }

            let index = match journal.as_deref_mut() {
                Some(manager) => Some(manager.record_operation(&op)?),
                None => None,
            };

            op.status = OperationStatus::InProgress;
            if let (Some(manager), Some(index)) = (journal.as_deref_mut(), index) {
                manager.update_operation(index, &op)?;
            }

            match fsops::move_file(&op.source, &op.destination) {
                Ok(method) => {
                    info!(
                        source = %op.source.display(),
                        destination = %op.destination.display(),
                        ?method,
                        "moved"
                    );
                    op.status = OperationStatus::Completed;
                }
                Err(e) => {
                    warn!(source = %op.source.display(), error = %e, "move failed");
                    op.status = OperationStatus::Failed;
                    op.error = Some(e.to_string());
                }
            }

            if let (Some(manager), Some(index)) = (journal.as_deref_mut(), index) {
                manager.update_operation(index, &op)?;
            }
            operations.push(op);
        }
        Ok(operations)
    }

    /// Final destination for a plan, or `None` if the plan is left out.
    fn destination_for(&mut self, plan: &Plan, strategy: ConflictStrategy) -> Option<PathBuf> {
        if !plan.conflict {
            return Some(plan.destination.clone());
        }
        match strategy {
            // Interactive conflicts are settled before execution; anything
            // still conflicting is skipped, never overwritten.
            ConflictStrategy::Skip | ConflictStrategy::Interactive => {
                let reason = plan
                    .conflict_reason
                    .clone()
                    .unwrap_or_else(|| crate::model::CONFLICT_DESTINATION_EXISTS.to_string());
                info!(source = %plan.source.display(), %reason, "skipped");
                self.skip(plan, reason);
                None
            }
            ConflictStrategy::Rename => {
                match conflict::resolve_rename(&plan.destination, self.options.max_rename_attempts) {
                    Ok(renamed) => {
                        info!(from = %plan.destination.display(), to = %renamed.display(), "renamed to avoid conflict");
                        Some(renamed)
                    }
                    Err(e) => {
                        warn!(source = %plan.source.display(), error = %e, "rename failed, skipping");
                        self.skip(plan, e.to_string());
                        None
                    }
                }
            }
        }
    }

    fn skip(&mut self, plan: &Plan, reason: String) {
        self.skipped.push(SkippedPlan {
            source: plan.source.clone(),
            destination: plan.destination.clone(),
            reason,
        });
    }
}
