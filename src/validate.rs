use crate::model::Plan;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pre-flight problems with a single plan. Never fatal for the batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("source does not exist: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("source is not a regular file: {}", .0.display())]
    SourceNotRegularFile(PathBuf),
    #[error("destination directory unreachable for {}: {reason}", path.display())]
    DestinationUnreachable { path: PathBuf, reason: String },
}

/// Check that the source is a regular file and the destination's nearest
/// existing ancestor is a directory.
pub fn validate_plan(plan: &Plan) -> Result<(), ValidationError> {
    match std::fs::symlink_metadata(&plan.source) {
        Ok(meta) if meta.file_type().is_file() => {}
        Ok(_) => return Err(ValidationError::SourceNotRegularFile(plan.source.clone())),
        Err(_) => return Err(ValidationError::SourceMissing(plan.source.clone())),
    }

    let unreachable = |reason: String| ValidationError::DestinationUnreachable {
        path: plan.destination.clone(),
        reason,
    };
    let ancestor = nearest_existing_ancestor(&plan.destination)
        .ok_or_else(|| unreachable("no existing ancestor".to_string()))?;
    if !ancestor.is_dir() {
        return Err(unreachable(format!(
            "{} is not a directory",
            ancestor.display()
        )));
    }
    Ok(())
}

/// Split plans into those that pass pre-flight and the errors for the rest.
pub fn validate_plans(plans: Vec<Plan>) -> (Vec<Plan>, Vec<ValidationError>) {
    let mut valid = Vec::with_capacity(plans.len());
    let mut errors = Vec::new();
    for plan in plans {
        match validate_plan(&plan) {
            Ok(()) => valid.push(plan),
            Err(e) => {
                tracing::warn!(error = %e, "plan failed validation");
                errors.push(e);
            }
        }
    }
    (valid, errors)
}

fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .filter(|p| !p.as_os_str().is_empty())
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}
