//! Owner of one coverage cache and the machinery that fills it.
//!
//! A session is built explicitly and handed to whoever needs coverage data.
//! Passes over the same session are serialized; readers may query while a
//! refresh is filling the tree.

use super::cache::{read_cache, shared, CoverageCache, NodeSummary, SharedCache};
use super::coordinator::{CollectionCoordinator, CollectionState, RefreshOutcome};
use super::enumerator::{FileEnumerator, WalkdirEnumerator};
use super::orchestrator::CoverageOrchestrator;
use super::progress::ProgressReporter;
use crate::config::{CoverageConfig, ToolSettings};
use crate::error::Result;
use crate::subprocess::SubprocessManager;
use std::path::Path;
use std::sync::{Arc, RwLockReadGuard};
use tokio::sync::Mutex;

pub struct CoverageSession {
    cache: SharedCache,
    coordinator: CollectionCoordinator,
    pass: Mutex<()>,
}

impl CoverageSession {
    pub fn new(
        subprocess: SubprocessManager,
        settings: ToolSettings,
        enumerator: Arc<dyn FileEnumerator>,
    ) -> Self {
        let cache = shared();
        let orchestrator = CoverageOrchestrator::new(subprocess.runner(), settings);
        let coordinator = CollectionCoordinator::new(Arc::clone(&cache), orchestrator, enumerator);
        Self {
            cache,
            coordinator,
            pass: Mutex::new(()),
        }
    }

    /// Session driving real processes with the settings and extensions in `config`
    pub fn from_config(config: &CoverageConfig) -> Result<Self> {
        let settings = config.tool_settings()?;
        Ok(Self::new(
            SubprocessManager::production(),
            settings,
            Arc::new(WalkdirEnumerator::new(config.extensions())),
        ))
    }

    pub async fn refresh(
        &self,
        root: &Path,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<RefreshOutcome> {
        let _pass = self.pass.lock().await;
        self.coordinator.refresh(root, progress).await
    }

    pub async fn erase(&self) -> Result<()> {
        let _pass = self.pass.lock().await;
        self.coordinator.erase().await
    }

    pub fn query(&self, path: &Path) -> Result<NodeSummary> {
        read_cache(&self.cache).query(path)
    }

    pub fn state(&self) -> CollectionState {
        self.coordinator.state()
    }

    /// Read access to the whole tree; hold it briefly, a refresh waits on it
    pub fn cache(&self) -> RwLockReadGuard<'_, CoverageCache> {
        read_cache(&self.cache)
    }
}
