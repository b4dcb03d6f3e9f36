use crate::model::path_occupied;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// How a move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Rename,
    CopyAndDelete,
}

/// Move a regular file, creating the destination's parent directories.
///
/// Never overwrites: an occupied destination is an `AlreadyExists` error.
/// Same-filesystem moves are a single `rename`; across filesystems the file
/// is copied beside the destination, synced, linked into place without
/// clobbering, and only then is the source removed.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<MoveMethod> {
    if path_occupied(dst) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination already exists: {}", dst.display()),
        ));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(MoveMethod::Rename),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(src = %src.display(), dst = %dst.display(), "cross-device move, copying");
            copy_then_remove(src, dst)?;
            Ok(MoveMethod::CopyAndDelete)
        }
        Err(e) => Err(e),
    }
}

fn copy_then_remove(src: &Path, dst: &Path) -> io::Result<()> {
    copy_then_remove_with(src, dst, |path| fs::remove_file(path))
}

/// If the source cannot be removed, the copy is taken back out so the file
/// exists in exactly one place when the move is reported as failed.
fn copy_then_remove_with(
    src: &Path,
    dst: &Path,
    remove_source: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    let meta = fs::metadata(src)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".reloc.")
        .suffix(".part")
        .tempfile_in(parent)?;
    let mut reader = fs::File::open(src)?;
    io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().set_permissions(meta.permissions())?;
    staged.as_file().sync_all()?;

    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    filetime::set_file_mtime(staged.path(), mtime)?;

    staged.persist_noclobber(dst).map_err(|e| e.error)?;
    if let Err(e) = remove_source(src) {
        return match fs::remove_file(dst) {
            Ok(()) => Err(e),
            Err(cleanup) => {
                warn!(src = %src.display(), dst = %dst.display(), error = %cleanup, "copy left at destination");
                Err(io::Error::new(
                    e.kind(),
                    format!(
                        "copied to {} but could not remove source: {e}; the copy could not be removed either: {cleanup}",
                        dst.display()
                    ),
                ))
            }
        };
    }
    Ok(())
}
