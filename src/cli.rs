use crate::model::{ConflictStrategy, MediaType};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Journaled, rollback-able media file relocation.
#[derive(Parser)]
#[command(name = "reloc", version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// JSON config file.
    #[arg(long, global = true, env = "RELOC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Plan and move files into the library layout.
    Organize(OrganizeArgs),
    /// Reverse, list, or inspect journaled transactions.
    Rollback(RollbackArgs),
    /// Print JSON Schema for transaction records.
    Schema,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OrganizeArgs {
    /// Directory to scan.
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Destination root (defaults to config `dest_root`, then DIR).
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// How to handle destinations that already exist.
    #[arg(long, value_enum)]
    pub conflict: Option<ConflictStrategy>,

    /// Only organize one media type.
    #[arg(long = "type", value_enum)]
    pub media_type: Option<MediaType>,

    /// Show what would happen without moving anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not journal this run (it cannot be rolled back).
    #[arg(long)]
    pub no_transaction: bool,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,

    /// Transaction log directory.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RollbackArgs {
    /// Transaction ID.
    #[arg(required_unless_present = "list")]
    pub id: Option<String>,

    /// List all journaled transactions.
    #[arg(long, conflicts_with_all = ["id", "show"])]
    pub list: bool,

    /// Show the transaction instead of rolling it back.
    #[arg(long, requires = "id")]
    pub show: bool,

    /// Output structured JSON to stdout.
    #[arg(long)]
    pub json: bool,

    /// Transaction log directory.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}
