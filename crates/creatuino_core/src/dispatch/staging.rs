//! Temp-file staging and atomic publication of job outputs.
//!
//! Outputs are always produced under a hidden temp name in the destination
//! directory and renamed into place only once complete, so a destination
//! path never holds a partially written file.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::{Builder, NamedTempFile, TempPath};

use crate::errors::{JobError, StructuralError};

const TEMP_PREFIX: &str = ".creatuino-";

/// How publishing a staged file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Published {
    /// The destination now holds the new file.
    Written,
    /// Another file appeared at the destination first; it was left alone.
    DestinationExists,
}

/// Create the destination's parent directories.
pub(crate) fn ensure_parent(dest: &Path) -> Result<(), JobError> {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| JobError::io("creating directory", parent, e))
        }
        _ => Ok(()),
    }
}

fn staging_dir(dest: &Path) -> &Path {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Open a temp file next to `dest` for direct writing.
pub(crate) fn stage_file(dest: &Path) -> Result<NamedTempFile, JobError> {
    let dir = staging_dir(dest);
    Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| JobError::io("creating temp file in", dir, e))
}

/// Reserve a temp path next to `dest` for an external writer.
///
/// The path keeps the destination's extension so the encoder can infer the
/// output format from it. The file is removed when the returned path drops
/// unless it has been published.
pub(crate) fn stage_path(dest: &Path) -> Result<TempPath, JobError> {
    let dir = staging_dir(dest);
    let suffix = dest
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile_in(dir)
        .map(NamedTempFile::into_temp_path)
        .map_err(|e| JobError::io("creating temp file in", dir, e))
}

/// Move a finished temp file to `dest`.
///
/// Without `overwrite`, an existing destination is never replaced.
pub(crate) fn publish(temp: TempPath, dest: &Path, overwrite: bool) -> Result<Published, JobError> {
    let result = if overwrite {
        temp.persist(dest)
    } else {
        temp.persist_noclobber(dest)
    };

    match result {
        Ok(()) => Ok(Published::Written),
        Err(e) if !overwrite && e.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(Published::DestinationExists)
        }
        Err(e) => Err(JobError::io("renaming temp file to", dest, e.error)),
    }
}

/// Check that files can be created in `root`.
pub fn probe_writable(root: &Path) -> Result<(), StructuralError> {
    Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(root)
        .map(drop)
        .map_err(|source| StructuralError::OutputRootUnwritable {
            path: root.to_path_buf(),
            source,
        })
}
