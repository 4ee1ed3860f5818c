//! Directory traversal.
//!
//! Every regular file under the root is a candidate trace file, whatever
//! its extension. Entries are visited depth-first with siblings sorted by
//! name, so repeated runs upload in the same order.

use crate::core::{ReplayError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lazily enumerate trace files under `root`.
pub fn walk(root: &Path) -> TraceFiles {
    TraceFiles {
        root: root.to_path_buf(),
        inner: WalkDir::new(root).sort_by_file_name().into_iter(),
    }
}

/// Iterator over the regular files of a directory tree.
///
/// Yields `Err(ReplayError::Walk)` when the traversal itself fails, such as
/// a missing root or an unreadable directory. Callers treat that as fatal.
pub struct TraceFiles {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl Iterator for TraceFiles {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    return Some(Err(ReplayError::Walk {
                        root: self.root.clone(),
                        source,
                    }))
                },
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            // Links count only when they resolve to a regular file.
            if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
                return Some(Ok(entry.into_path()));
            }
            tracing::debug!(path = %entry.path().display(), "Skipping non-regular file");
        }
    }
}
