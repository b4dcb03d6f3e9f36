//! Turns a scanned file list into proposed relocations.
//!
//! Classification, metadata parsing and naming are delegated to the
//! collaborators in [`crate::media`]. Per-file failures never abort planning:
//! the file is logged and left out of the result.

use crate::conflict;
use crate::error::{RelocError, Result};
use crate::media::{Detector, MetadataParser, Naming};
use crate::model::{MediaType, OperationKind, Plan};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct Planner<'a> {
    detector: &'a dyn Detector,
    parser: &'a dyn MetadataParser,
    naming: &'a dyn Naming,
}

impl<'a> Planner<'a> {
    pub fn new(
        detector: &'a dyn Detector,
        parser: &'a dyn MetadataParser,
        naming: &'a dyn Naming,
    ) -> Self {
        Self {
            detector,
            parser,
            naming,
        }
    }

    /// Build a plan for every acceptable file, in input order.
    ///
    /// `type_filter` of `None` accepts every classified type. Destinations
    /// that already exist are flagged as conflicts, not dropped.
    pub fn plan_organization(
        &self,
        files: &[PathBuf],
        dest_root: &Path,
        type_filter: Option<MediaType>,
    ) -> Result<Vec<Plan>> {
        if !dest_root.is_absolute() {
            return Err(RelocError::InvalidDestinationRoot(dest_root.to_path_buf()));
        }

        let mut plans = Vec::with_capacity(files.len());
        for file in files {
            if let Some(plan) = self.plan_file(file, dest_root, type_filter) {
                plans.push(plan);
            }
        }

        let conflicts = plans.iter().filter(|p| p.conflict).count();
        info!(
            files = files.len(),
            planned = plans.len(),
            conflicts,
            "planning complete"
        );
        Ok(plans)
    }

    fn plan_file(
        &self,
        file: &Path,
        dest_root: &Path,
        type_filter: Option<MediaType>,
    ) -> Option<Plan> {
        let media_type = self.detector.detect(file);
        if media_type == MediaType::Unknown {
            debug!(file = %file.display(), "skipping unclassified file");
            return None;
        }
        if type_filter.is_some_and(|wanted| wanted != media_type) {
            debug!(file = %file.display(), %media_type, "skipping filtered media type");
            return None;
        }

        let metadata = match self.parser.parse(file, media_type) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "metadata parse failed, skipping");
                return None;
            }
        };

        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(destination) =
            self.naming
                .build_full_path(dest_root, media_type, &metadata, &ext)
        else {
            warn!(file = %file.display(), "no destination path could be built, skipping");
            return None;
        };

        // A `-<n>` sibling is the output of an earlier rename; leave it be.
        if destination == file || conflict::is_numbered_variant(file, &destination) {
            debug!(file = %file.display(), "already at destination");
            return None;
        }

        let mut plan = Plan {
            source: file.to_path_buf(),
            destination,
            media_type,
            metadata,
            kind: OperationKind::Move,
            conflict: false,
            conflict_reason: None,
        };
        plan.refresh_conflict();
        if plan.conflict {
            debug!(
                source = %plan.source.display(),
                destination = %plan.destination.display(),
                "destination already exists"
            );
        }
        Some(plan)
    }
}
