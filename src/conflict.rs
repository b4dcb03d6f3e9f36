//! Conflict resolution for plans whose destination already exists.
//!
//! `skip` needs no pass of its own; the executor simply leaves those plans
//! out. `rename` tries numbered siblings of the destination. `interactive`
//! asks the operator once per conflicting plan, before execution.

use crate::error::{RelocError, Result};
use crate::model::{Plan, path_occupied};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_MAX_RENAME_ATTEMPTS: u32 = 999;

/// Find the first free `<base>-<n><ext>` sibling of `dst` for n in 1..=max_attempts.
///
/// `Movie (2020).mkv` becomes `Movie (2020)-1.mkv`; `.env` becomes `.env-1`.
pub fn resolve_rename(dst: &Path, max_attempts: u32) -> Result<PathBuf> {
    resolve_rename_avoiding(dst, max_attempts, &HashSet::new())
}

/// Like [`resolve_rename`], also passing over candidates in `claimed`.
pub fn resolve_rename_avoiding(
    dst: &Path,
    max_attempts: u32,
    claimed: &HashSet<PathBuf>,
) -> Result<PathBuf> {
    let stem: OsString = dst
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    let ext = dst.extension();

    for n in 1..=max_attempts {
        let mut name = stem.clone();
        name.push(format!("-{n}"));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let candidate = dst.with_file_name(name);
        if !path_occupied(&candidate) && !claimed.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(RelocError::RenameExhausted {
        path: dst.to_path_buf(),
        attempts: max_attempts,
    })
}

/// True when `path` is a `<stem>-<n><ext>` sibling of `dst`, the shape
/// [`resolve_rename`] produces.
pub fn is_numbered_variant(path: &Path, dst: &Path) -> bool {
    if path.parent() != dst.parent() {
        return false;
    }
    let (Some(name), Some(stem)) = (
        path.file_name().and_then(|n| n.to_str()),
        dst.file_stem().and_then(|s| s.to_str()),
    ) else {
        return false;
    };
    let Some(rest) = name.strip_prefix(stem).and_then(|r| r.strip_prefix('-')) else {
        return false;
    };
    let digits = match dst.extension().and_then(|e| e.to_str()) {
        Some(ext) => rest
            .strip_suffix(ext)
            .and_then(|r| r.strip_suffix('.')),
        None => Some(rest),
    };
    digits.is_some_and(|d| {
        !d.is_empty() && !d.starts_with('0') && d.bytes().all(|b| b.is_ascii_digit())
    })
}

/// Rewrite a conflicting plan onto a free renamed destination not already in
/// `claimed`, and claim it.
pub fn apply_rename(
    plan: &mut Plan,
    max_attempts: u32,
    claimed: &mut HashSet<PathBuf>,
) -> Result<()> {
    let renamed = resolve_rename_avoiding(&plan.destination, max_attempts, claimed)?;
    claimed.insert(renamed.clone());
    info!(
        from = %plan.destination.display(),
        to = %renamed.display(),
        "conflict resolved by rename"
    );
    plan.destination = renamed;
    plan.clear_conflict();
    Ok(())
}

/// Operator answer for one conflicting plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Rename,
    SkipAll,
}

/// Parse an operator answer. Anything unrecognized means skip.
pub fn parse_decision(input: &str) -> Decision {
    match input.trim().to_ascii_lowercase().as_str() {
        "r" | "rename" => Decision::Rename,
        "a" | "all" | "skip-all" | "skipall" | "skip all" => Decision::SkipAll,
        _ => Decision::Skip,
    }
}

/// Prompts on `output` and reads answers from `input`, one line per conflict.
pub struct InteractiveResolver<R, W> {
    input: R,
    output: W,
    max_rename_attempts: u32,
}

impl<R: BufRead, W: Write> InteractiveResolver<R, W> {
    pub fn new(input: R, output: W, max_rename_attempts: u32) -> Self {
        Self {
            input,
            output,
            max_rename_attempts,
        }
    }

    /// Resolve every conflicting plan in order, returning `(kept, skipped)`.
    /// Non-conflicting plans pass through unchanged.
    pub fn resolve(&mut self, plans: Vec<Plan>) -> (Vec<Plan>, Vec<Plan>) {
        let mut skip_all = false;
        // Destinations handed out in this batch; none of them exist on disk yet.
        let mut claimed: HashSet<PathBuf> = plans
            .iter()
            .filter(|p| !p.conflict)
            .map(|p| p.destination.clone())
            .collect();
        let mut resolved = Vec::with_capacity(plans.len());
        let mut skipped = Vec::new();

        for mut plan in plans {
            if !plan.conflict {
                resolved.push(plan);
                continue;
            }
            if skip_all {
                info!(source = %plan.source.display(), "conflict skipped (skip-all)");
                skipped.push(plan);
                continue;
            }
            match self.ask(&plan) {
                Decision::Skip => {
                    info!(source = %plan.source.display(), "conflict skipped by operator");
                    skipped.push(plan);
                }
                Decision::SkipAll => {
                    info!(source = %plan.source.display(), "conflict skipped, skipping all remaining");
                    skip_all = true;
                    skipped.push(plan);
                }
                Decision::Rename => match apply_rename(&mut plan, self.max_rename_attempts, &mut claimed) {
                    Ok(()) => resolved.push(plan),
                    Err(e) => {
                        warn!(source = %plan.source.display(), error = %e, "rename failed, skipping");
                        skipped.push(plan);
                    }
                },
            }
        }
        (resolved, skipped)
    }

    fn ask(&mut self, plan: &Plan) -> Decision {
        let prompt = writeln!(
            self.output,
            "Conflict: {}\n  would move to: {}\n  which already exists.",
            plan.source.display(),
            plan.destination.display()
        )
        .and_then(|()| write!(self.output, "[s]kip, [r]ename, skip [a]ll? "))
        .and_then(|()| self.output.flush());
        if let Err(e) = prompt {
            warn!(error = %e, "failed to write prompt, skipping");
            return Decision::Skip;
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(_) => parse_decision(&line),
            Err(e) => {
                warn!(error = %e, "failed to read answer, skipping");
                Decision::Skip
            }
        }
    }
}
