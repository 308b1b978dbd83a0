//! Resume corpus scanning: immediate children only, supported extensions,
//! lexicographic order, capped count.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::extract::DocumentKind;

/// Hard cap on files processed per run.
pub const MAX_CORPUS_FILES: usize = 200;

#[derive(Debug)]
pub struct CorpusScan {
    pub files: Vec<PathBuf>,
    /// Eligible files found before truncation to the cap.
    pub found: usize,
}

impl CorpusScan {
    pub fn truncated(&self) -> bool {
        self.found > self.files.len()
    }
}

/// Lists eligible resume files in `dir`, sorted by path, truncated to `cap`.
/// Truncation logs a warning; it is never an error.
pub fn scan_corpus(dir: &Path, cap: usize) -> Result<CorpusScan> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read uploads folder: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && DocumentKind::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();

    let found = files.len();
    if found > cap {
        warn!("Found {} files, limiting to {}", found, cap);
        files.truncate(cap);
    }

    Ok(CorpusScan { files, found })
}
