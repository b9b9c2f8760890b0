//! Discovery of the files handed to the coverage tool.

use super::progress::ProgressReporter;
use crate::config::DEFAULT_EXTENSIONS;
use crate::error::{CovtreeError, ErrorCode, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Files and folders below a root; folders are ordered ancestors first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    pub files: Vec<PathBuf>,
    pub folders: Vec<PathBuf>,
}

impl Enumeration {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub trait FileEnumerator: Send + Sync {
    /// Returns an empty enumeration when `root` does not exist
    fn enumerate(&self, root: &Path, progress: &dyn ProgressReporter) -> Result<Enumeration>;
}

pub struct WalkdirEnumerator {
    extensions: Vec<String>,
}

impl Default for WalkdirEnumerator {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect())
    }
}

impl WalkdirEnumerator {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

impl FileEnumerator for WalkdirEnumerator {
    fn enumerate(&self, root: &Path, progress: &dyn ProgressReporter) -> Result<Enumeration> {
        if !root.exists() {
            return Ok(Enumeration::default());
        }

        let mut files = Vec::new();
        let mut folders = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));

        for entry in walker {
            if progress.is_cancelled() {
                tracing::info!("Enumeration of {} cancelled", root.display());
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(CovtreeError::process_io(
                        ErrorCode::PROCESS_IO_ENUMERATION,
                        format!("cannot read {}", root.display()),
                        None,
                    )
                    .with_source(err));
                }
                Err(err) => {
                    tracing::warn!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                progress.set_task(&format!("Scanning {}", entry.path().display()));
                folders.push(entry.into_path());
            } else if entry.file_type().is_file() && self.is_source_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        // Only folders leading to at least one source file are kept.
        let wanted: HashSet<&Path> = files
            .iter()
            .flat_map(|file| file.ancestors().skip(1))
            .collect();
        folders.retain(|folder| wanted.contains(folder.as_path()));

        tracing::debug!(
            "Enumerated {} files in {} folders below {}",
            files.len(),
            folders.len(),
            root.display()
        );

        Ok(Enumeration { files, folders })
    }
}
