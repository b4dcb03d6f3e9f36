use crate::cli::{OrganizeArgs, RollbackArgs};
use crate::config::{self, Config};
use crate::conflict::InteractiveResolver;
use crate::error::RelocError;
use crate::events::Event;
use crate::executor::{ExecuteOptions, Executor};
use crate::exit_codes::exit;
use crate::media::{DefaultNaming, ExtensionDetector, FilenameParser};
use crate::model::{ConflictStrategy, OperationStatus, Transaction};
use crate::planner::Planner;
use crate::reporter::Reporter;
use crate::scan;
use crate::transaction::TransactionManager;
use crate::validate;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

fn resolve_log_dir(flag: Option<&PathBuf>, config: &Config) -> Result<PathBuf> {
    match flag {
        Some(dir) => config::absolute(dir),
        None => Ok(config.log_dir.clone()),
    }
}

pub fn organize(args: OrganizeArgs, config: &Config) -> Result<i32> {
    let mut reporter = Reporter::new(args.json);

    let dir = config::absolute(&args.dir)?;
    let dest_root = match &args.dest {
        Some(dest) => config::absolute(dest)?,
        None => config.dest_root.clone().unwrap_or_else(|| dir.clone()),
    };
    let strategy = args.conflict.unwrap_or(config.conflict);

    let files = scan::scan_files(&dir)?;
    let planner = Planner::new(&ExtensionDetector, &FilenameParser, &DefaultNaming);
    let plans = planner
        .plan_organization(&files, &dest_root, args.media_type)
        .context("planning failed")?;
    reporter.record(Event::Planned {
        files: files.len(),
        plans: plans.len(),
        conflicts: plans.iter().filter(|p| p.conflict).count(),
    });

    let (mut plans, invalid) = validate::validate_plans(plans);
    for error in &invalid {
        reporter.record(Event::ValidationFailed {
            error: error.to_string(),
        });
    }

    if strategy == ConflictStrategy::Interactive && plans.iter().any(|p| p.conflict) {
        let stdin = std::io::stdin();
        let mut resolver =
            InteractiveResolver::new(stdin.lock(), std::io::stderr(), config.max_rename_attempts);
        let (kept, skipped) = resolver.resolve(plans);
        for plan in skipped {
            reporter.record(Event::OpSkipped {
                src: plan.source,
                dst: plan.destination,
                reason: "skipped by operator".to_string(),
            });
        }
        plans = kept;
    }

    let mut executor = Executor::new(ExecuteOptions {
        dry_run: args.dry_run,
        max_rename_attempts: config.max_rename_attempts,
    });
    let mut manager = if !args.dry_run && !args.no_transaction {
        let log_dir = resolve_log_dir(args.log_dir.as_ref(), config)?;
        let manager = TransactionManager::new(&log_dir)
            .with_context(|| format!("failed to open transaction log {}", log_dir.display()))?;
        Some(manager)
    } else {
        None
    };
    let outcome = match manager.as_mut() {
        Some(manager) => executor
            .execute_with_transaction(manager, &plans, strategy)
            .map(|(id, ops)| (Some(id), ops)),
        None => executor.execute(&plans, strategy).map(|ops| (None, ops)),
    };

    let (transaction_id, operations) = match outcome {
        Ok(done) => done,
        Err(RelocError::Journal { id, source }) => {
            reporter.record(Event::TxnHalted {
                transaction_id: manager.as_ref().and_then(|m| recorded_transaction(m, id)),
                error: source.to_string(),
            });
            return Ok(exit::JOURNAL_FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    for op in operations {
        match op.status {
            OperationStatus::Failed => reporter.record(Event::OpFailed {
                src: op.source,
                dst: op.destination,
                error: op.error.unwrap_or_default(),
            }),
            _ => reporter.record(Event::OpCompleted {
                src: op.source,
                dst: op.destination,
                dry_run: args.dry_run,
            }),
        }
    }
    for skipped in executor.skipped() {
        reporter.record(Event::OpSkipped {
            src: skipped.source.clone(),
            dst: skipped.destination.clone(),
            reason: skipped.reason.clone(),
        });
    }
    if let Some(transaction_id) = transaction_id {
        reporter.record(Event::TxnCommitted { transaction_id });
    }
    if !args.json {
        println!("{}", reporter.summary());
    }

    if reporter.failed() > 0 || !invalid.is_empty() {
        Ok(exit::OPERATIONAL_FAILURE)
    } else {
        Ok(exit::SUCCESS)
    }
}

/// `id` if its record made it to disk. A halt in the very first save leaves
/// nothing to roll back.
fn recorded_transaction(manager: &TransactionManager, id: String) -> Option<String> {
    manager.load(&id).is_ok().then_some(id)
}

pub fn rollback(args: RollbackArgs, config: &Config) -> Result<i32> {
    let log_dir = resolve_log_dir(args.log_dir.as_ref(), config)?;
    let manager = TransactionManager::new(&log_dir)
        .with_context(|| format!("failed to open transaction log {}", log_dir.display()))?;

    if args.list {
        list_transactions(&manager, args.json)?;
        return Ok(exit::SUCCESS);
    }

    let id = args.id.context("a transaction ID is required")?;
    if args.show {
        let txn = manager.load(&id)?;
        show_transaction(&txn, args.json)?;
        return Ok(exit::SUCCESS);
    }

    let mut reporter = Reporter::new(args.json);
    match manager.rollback(&id) {
        Ok(report) => {
            reporter.record(Event::RollbackCompleted {
                transaction_id: report.id,
                restored: report.restored.len(),
            });
            Ok(exit::SUCCESS)
        }
        Err(RelocError::RollbackIncomplete { id, failures }) => {
            reporter.record(Event::RollbackIncomplete {
                transaction_id: id,
                not_restored: failures.iter().map(ToString::to_string).collect(),
            });
            Ok(exit::ROLLBACK_INCOMPLETE)
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Serialize)]
struct ListRow {
    id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    operations: usize,
}

fn list_transactions(manager: &TransactionManager, json: bool) -> Result<()> {
    let mut rows = Vec::new();
    for id in manager.list()? {
        match manager.load(&id) {
            Ok(txn) => rows.push(ListRow {
                id: txn.id,
                status: txn.status.to_string(),
                timestamp: Some(txn.timestamp),
                operations: txn.operations.len(),
            }),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "unreadable transaction record");
                rows.push(ListRow {
                    id,
                    status: "unreadable".to_string(),
                    timestamp: None,
                    operations: 0,
                });
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No transactions in {}", manager.log_dir().display());
        return Ok(());
    }
    let now = Utc::now();
    for row in &rows {
        let age = row
            .timestamp
            .and_then(|ts| (now - ts).to_std().ok())
            .map(|d| {
                let secs = std::time::Duration::from_secs(d.as_secs());
                format!("{} ago", humantime::format_duration(secs))
            })
            .unwrap_or_default();
        println!(
            "{}  {:<12} {:>4} op(s)  {}",
            row.id, row.status, row.operations, age
        );
    }
    Ok(())
}

fn show_transaction(txn: &Transaction, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(txn)?);
        return Ok(());
    }
    println!("Transaction: {}", txn.id);
    println!("Status:      {}", txn.status);
    println!("Started:     {}", txn.timestamp.to_rfc3339());
    if let Some(completed) = txn.completed {
        println!("Completed:   {}", completed.to_rfc3339());
    }
    if let Some(error) = &txn.error {
        println!("Error:       {error}");
    }
    println!(
        "Operations:  {} completed, {} failed, {} total",
        txn.count(OperationStatus::Completed),
        txn.count(OperationStatus::Failed),
        txn.operations.len()
    );
    for op in &txn.operations {
        print!(
            "  {:<11} {} -> {}",
            op.status.to_string(),
            op.source.display(),
            op.destination.display()
        );
        match &op.error {
            Some(error) => println!("  ({error})"),
            None => println!(),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halted_transaction_id_is_reported_only_when_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = TransactionManager::new(dir.path()).unwrap();

        let never_saved = crate::journal::new_transaction_id();
        assert_eq!(recorded_transaction(&manager, never_saved), None);

        let id = manager.begin().unwrap();
        assert_eq!(recorded_transaction(&manager, id.clone()), Some(id));
    }
}
