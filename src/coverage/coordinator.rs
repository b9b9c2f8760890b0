//! Entry point of a collection pass: enumerate, seed the tree, analyze.

use super::cache::{write_cache, CoverageCache, SharedCache};
use super::enumerator::{Enumeration, FileEnumerator};
use super::orchestrator::{CollectionReport, CoverageOrchestrator, PassEnd};
use super::parser::LineRecord;
use super::progress::ProgressReporter;
use crate::error::{CovtreeError, ErrorCode, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Idle,
    Enumerating,
    Analyzing,
    Done,
}

/// Result of a refresh that did not hit a fatal error
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The root is missing or holds no source files; the cache stays empty
    NoData,
    Completed(CollectionReport),
    Cancelled(CollectionReport),
    /// The tool could not be driven to the end; records received so far are kept
    Failed {
        error: CovtreeError,
        report: CollectionReport,
    },
}

impl RefreshOutcome {
    pub fn report(&self) -> Option<&CollectionReport> {
        match self {
            RefreshOutcome::NoData => None,
            RefreshOutcome::Completed(report)
            | RefreshOutcome::Cancelled(report)
            | RefreshOutcome::Failed { report, .. } => Some(report),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RefreshOutcome::Completed(_))
    }
}

pub struct CollectionCoordinator {
    cache: SharedCache,
    orchestrator: CoverageOrchestrator,
    enumerator: Arc<dyn FileEnumerator>,
    state: Mutex<CollectionState>,
}

impl CollectionCoordinator {
    pub fn new(
        cache: SharedCache,
        orchestrator: CoverageOrchestrator,
        enumerator: Arc<dyn FileEnumerator>,
    ) -> Self {
        Self {
            cache,
            orchestrator,
            enumerator,
            state: Mutex::new(CollectionState::Idle),
        }
    }

    pub fn state(&self) -> CollectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: CollectionState) {
        tracing::trace!("Collection state -> {:?}", state);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Rebuild the cache from scratch for everything below `root`
    pub async fn refresh(
        &self,
        root: &Path,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<RefreshOutcome> {
        write_cache(&self.cache).clear();

        if !root.exists() {
            tracing::info!("Coverage root {} does not exist", root.display());
            self.set_state(CollectionState::Done);
            return Ok(RefreshOutcome::NoData);
        }

        if !root.is_dir() {
            self.set_state(CollectionState::Done);
            return Err(CovtreeError::config_with_code(
                ErrorCode::CONFIG_INVALID_ROOT,
                "coverage root must be a directory",
            )
            .with_path(root));
        }

        let root = tokio::fs::canonicalize(root).await.map_err(|e| {
            CovtreeError::config_with_code(ErrorCode::CONFIG_INVALID_ROOT, "cannot resolve root")
                .with_path(root)
                .with_source(e)
        })?;

        self.set_state(CollectionState::Enumerating);
        let enumeration = match self.enumerate(root.clone(), Arc::clone(&progress)).await {
            Ok(enumeration) => enumeration,
            Err(e) => {
                self.set_state(CollectionState::Done);
                return Err(e);
            }
        };

        if progress.is_cancelled() {
            self.set_state(CollectionState::Done);
            return Ok(RefreshOutcome::Cancelled(CollectionReport::default()));
        }

        if enumeration.is_empty() {
            tracing::info!("No source files below {}", root.display());
            self.set_state(CollectionState::Done);
            return Ok(RefreshOutcome::NoData);
        }

        let seeded = {
            let mut cache = write_cache(&self.cache);
            seed_folders(&mut cache, &enumeration.folders)
        };
        if let Err(e) = seeded {
            self.set_state(CollectionState::Done);
            return Err(e);
        }

        tracing::info!(
            "Collecting coverage for {} files below {}",
            enumeration.files.len(),
            root.display()
        );

        self.set_state(CollectionState::Analyzing);
        let mut report = CollectionReport::default();
        let cache = Arc::clone(&self.cache);
        let result = self
            .orchestrator
            .analyze(&enumeration.files, progress.as_ref(), &mut report, |record| {
                apply_record(&cache, record)
            })
            .await;

        self.set_state(CollectionState::Done);
        progress.set_task("Finished");
        progress.worked(1);

        match result {
            Ok(PassEnd::Finished) => Ok(RefreshOutcome::Completed(report)),
            Ok(PassEnd::Cancelled) => Ok(RefreshOutcome::Cancelled(report)),
            Err(error @ CovtreeError::CacheState { .. }) => Err(error),
            Err(error) => {
                tracing::error!("Coverage collection failed: {}", error);
                Ok(RefreshOutcome::Failed { error, report })
            }
        }
    }

    /// Discard the tool's coverage data and everything cached from it
    pub async fn erase(&self) -> Result<()> {
        self.orchestrator.erase().await?;
        write_cache(&self.cache).clear();
        self.set_state(CollectionState::Idle);
        tracing::info!(
            "Erased coverage data in {}",
            self.orchestrator.settings().data_dir.display()
        );
        Ok(())
    }

    async fn enumerate(
        &self,
        root: PathBuf,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<Enumeration> {
        let enumerator = Arc::clone(&self.enumerator);
        tokio::task::spawn_blocking(move || enumerator.enumerate(&root, progress.as_ref()))
            .await
            .map_err(|e| {
                CovtreeError::process_io(
                    ErrorCode::PROCESS_IO_ENUMERATION,
                    "enumeration task failed",
                    None,
                )
                .with_source(e)
            })?
    }
}

/// Register the folder skeleton; the first folder becomes the root
fn seed_folders(cache: &mut CoverageCache, folders: &[PathBuf]) -> Result<()> {
    let Some((root, rest)) = folders.split_first() else {
        return Ok(());
    };

    cache.add_root(root)?;
    for folder in rest {
        let parent = folder.parent().ok_or_else(|| {
            CovtreeError::cache_state(ErrorCode::CACHE_MISSING_PARENT, "folder has no parent", folder)
        })?;
        cache.add_folder(folder, parent)?;
    }
    Ok(())
}

fn apply_record(cache: &RwLock<CoverageCache>, record: LineRecord) -> Result<()> {
    let mut cache = write_cache(cache);

    let Some(path) = record.path() else {
        return Ok(());
    };
    let parent = match path.parent().and_then(|parent| cache.node(parent)) {
        Some(node) if node.is_folder() => node.path().to_path_buf(),
        Some(_) => {
            tracing::warn!("Dropping record for {}: parent is a file", path.display());
            return Ok(());
        }
        None => {
            tracing::debug!("Dropping record for {} outside the collected tree", path.display());
            return Ok(());
        }
    };
    if cache.node(path).is_some_and(|existing| existing.is_folder()) {
        tracing::warn!("Dropping record for {}: path is a folder", path.display());
        return Ok(());
    }

    match record {
        LineRecord::Coverage(coverage) => cache.add_file(
            &coverage.path,
            &parent,
            coverage.statements,
            coverage.missed,
            coverage.missed_lines,
        ),
        LineRecord::Error(error) => {
            tracing::debug!("{} could not be analyzed: {}", error.path.display(), error.message);
            cache.add_file_error(&error.path, &parent, error.message)
        }
        LineRecord::Ignored => Ok(()),
    }
}
