//! Recursive directory size aggregation.
//!
//! Sizes are computed on demand for every listing; nothing is cached.
//! Aggregation is best-effort: an entry that cannot be read contributes zero
//! and is logged, it never fails the listing that asked for the size.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

/// Default maximum directory depth below the aggregated directory.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Computes the total byte size of a directory tree.
///
/// Symbolic links are never followed: their type is taken from the directory
/// entry itself, so a link contributes nothing and link cycles cannot loop.
#[derive(Debug, Clone, Copy)]
pub struct DirectorySizeAggregator {
    /// Directories deeper than this below the starting point are skipped.
    max_depth: usize,
}

impl Default for DirectorySizeAggregator {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DirectorySizeAggregator {
    /// Create an aggregator with the given depth bound.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Total size in bytes of all regular files below `path`.
    pub async fn size_of(&self, path: &Path) -> u64 {
        let mut total: u64 = 0;
        let mut pending: Vec<(PathBuf, usize)> = vec![(path.to_path_buf(), 0)];

        while let Some((dir, depth)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Failed to read directory while aggregating size");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "Failed to read directory entry");
                        break;
                    }
                };

                let entry_path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(path = %entry_path.display(), error = %e, "Failed to stat entry");
                        continue;
                    }
                };

                if file_type.is_dir() {
                    if depth >= self.max_depth {
                        warn!(
                            path = %entry_path.display(),
                            max_depth = self.max_depth,
                            "Directory depth limit reached, skipping subtree"
                        );
                        continue;
                    }
                    pending.push((entry_path, depth + 1));
                } else if file_type.is_file() {
                    match entry.metadata().await {
                        Ok(metadata) => total = total.saturating_add(metadata.len()),
                        Err(e) => {
                            // Usually a file removed mid-walk.
                            warn!(path = %entry_path.display(), error = %e, "Failed to read file size");
                        }
                    }
                }
            }
        }

        debug!(path = %path.display(), size = total, "Aggregated directory size");
        total
    }
}
