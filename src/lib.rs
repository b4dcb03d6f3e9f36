//! `reloc` - journaled, rollback-able media file relocation.
//!
//! The pipeline is plan, resolve conflicts, execute, journal. Rollback works
//! purely from a persisted [`model::Transaction`] record:
//!
//! - [`planner`] turns scanned files into [`model::Plan`]s using the
//!   collaborators in [`media`].
//! - [`conflict`] rewrites or drops conflicting plans.
//! - [`executor`] applies plans one move at a time.
//! - [`transaction`] persists every status change through [`journal`] and
//!   reverses completed moves on request.

pub mod cli;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod exit_codes;
pub mod fsops;
pub mod journal;
pub mod logging;
pub mod media;
pub mod model;
pub mod planner;
pub mod reporter;
pub mod scan;
pub mod transaction;
pub mod validate;

pub use error::{RelocError, RollbackFailure};
pub use executor::{ExecuteOptions, Executor};
pub use model::{ConflictStrategy, Operation, OperationStatus, Plan, Transaction, TransactionStatus};
pub use transaction::TransactionManager;
