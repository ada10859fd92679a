// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic write: write `path.tmp`, then rename (`spec.md` §4.1).
//!
//! Rename within the same directory is the atomicity boundary; callers
//! must not rely on cross-directory renames.

use cp_core::CommandPostError;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Write `bytes` to `path` atomically: write to a sibling `.tmp` file, then
/// rename over `path`. On any failure the `.tmp` file is best-effort
/// unlinked before the error is surfaced.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CommandPostError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CommandPostError::FileSystem {
            file_path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
    }

    let tmp_path = tmp_sibling(path);

    let write_result = fs::write(&tmp_path, bytes).and_then(|_| fs::rename(&tmp_path, path));

    if let Err(e) = write_result {
        if let Err(unlink_err) = fs::remove_file(&tmp_path) {
            if unlink_err.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    path = %tmp_path.display(),
                    error = %unlink_err,
                    "failed to unlink temp file after atomic_write failure"
                );
            }
        }
        return Err(CommandPostError::FileSystem {
            file_path: path.to_path_buf(),
            cause: e.to_string(),
        });
    }

    Ok(())
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Create an empty file at `path` if it doesn't already exist, creating
/// parent directories as needed. Used by stores to satisfy the "lock file
/// must exist before acquisition" contract for the target file.
pub fn ensure_exists(path: &Path, default_contents: &[u8]) -> Result<(), CommandPostError> {
    if path.exists() {
        return Ok(());
    }
    atomic_write(path, default_contents)
}
