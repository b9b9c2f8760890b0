//! Folder/file tree holding coverage results for one collection pass.
//!
//! Nodes live in a path-keyed arena. A node's parent is stored as a key rather
//! than a pointer, and every folder keeps a running aggregate of the
//! statement counts of the files below it. Insertion updates the ancestor chain
//! eagerly, so queries never walk subtrees.

use crate::error::{CovtreeError, ErrorCode, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::{AddAssign, SubAssign};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Statement counts of a file, or the sum over a folder's files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoverageStats {
    pub statements: u64,
    pub missed: u64,
}

impl CoverageStats {
    pub fn new(statements: u64, missed: u64) -> Self {
        Self { statements, missed }
    }

    pub fn executed(&self) -> u64 {
        self.statements.saturating_sub(self.missed)
    }

    /// Percentage of executed statements; an empty file counts as fully covered
    pub fn percent_covered(&self) -> f64 {
        if self.statements == 0 {
            100.0
        } else {
            self.executed() as f64 * 100.0 / self.statements as f64
        }
    }
}

impl AddAssign for CoverageStats {
    fn add_assign(&mut self, other: Self) {
        self.statements = self.statements.saturating_add(other.statements);
        self.missed = self.missed.saturating_add(other.missed);
    }
}

impl SubAssign for CoverageStats {
    fn sub_assign(&mut self, other: Self) {
        self.statements = self.statements.saturating_sub(other.statements);
        self.missed = self.missed.saturating_sub(other.missed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// Analysis result of a single file: either counts or a diagnostic, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCoverage {
    Covered {
        stats: CoverageStats,
        missed_lines: String,
    },
    Failed {
        message: String,
    },
}

impl FileCoverage {
    /// What this file adds to its ancestors' aggregates
    fn contribution(&self) -> CoverageStats {
        match self {
            FileCoverage::Covered { stats, .. } => *stats,
            FileCoverage::Failed { .. } => CoverageStats::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Folder { aggregate: CoverageStats },
    File(FileCoverage),
}

#[derive(Debug, Clone)]
pub struct CoverageNode {
    path: PathBuf,
    parent: Option<PathBuf>,
    children: BTreeMap<String, PathBuf>,
    data: NodeData,
}

impl CoverageNode {
    fn folder(path: &Path, parent: Option<&Path>) -> Self {
        Self {
            path: path.to_path_buf(),
            parent: parent.map(Path::to_path_buf),
            children: BTreeMap::new(),
            data: NodeData::Folder {
                aggregate: CoverageStats::default(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> Option<&Path> {
        self.parent.as_deref()
    }

    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Folder { .. } => NodeKind::Folder,
            NodeData::File(_) => NodeKind::File,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == NodeKind::Folder
    }

    /// Own counts for a file, aggregated counts for a folder
    pub fn stats(&self) -> CoverageStats {
        match &self.data {
            NodeData::Folder { aggregate } => *aggregate,
            NodeData::File(coverage) => coverage.contribution(),
        }
    }

    pub fn file_coverage(&self) -> Option<&FileCoverage> {
        match &self.data {
            NodeData::File(coverage) => Some(coverage),
            NodeData::Folder { .. } => None,
        }
    }

    pub fn missed_lines(&self) -> &str {
        match &self.data {
            NodeData::File(FileCoverage::Covered { missed_lines, .. }) => missed_lines,
            _ => "",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.data {
            NodeData::File(FileCoverage::Failed { message }) => Some(message),
            _ => None,
        }
    }

    /// Last path component, used as the key in the parent's child map
    pub fn name(&self) -> String {
        segment(&self.path)
    }

    pub fn summary(&self) -> NodeSummary {
        let stats = self.stats();
        NodeSummary {
            path: self.path.clone(),
            kind: self.kind(),
            statements: stats.statements,
            missed: stats.missed,
            missed_lines: self.missed_lines().to_string(),
            error: self.error_message().map(str::to_string),
        }
    }
}

/// Snapshot of one node returned by [`CoverageCache::query`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub path: PathBuf,
    pub kind: NodeKind,
    pub statements: u64,
    pub missed: u64,
    pub missed_lines: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeSummary {
    pub fn stats(&self) -> CoverageStats {
        CoverageStats::new(self.statements, self.missed)
    }
}

fn segment(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[derive(Debug, Default)]
pub struct CoverageCache {
    nodes: HashMap<PathBuf, CoverageNode>,
    root: Option<PathBuf>,
}

impl CoverageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn node(&self, path: &Path) -> Option<&CoverageNode> {
        self.nodes.get(path)
    }

    pub fn root(&self) -> Option<&CoverageNode> {
        self.root.as_ref().and_then(|root| self.nodes.get(root))
    }

    /// Register the root folder.
    ///
    /// Registering the current root again is a no-op; any other folder without
    /// a parent is rejected once a root exists.
    pub fn add_root(&mut self, path: &Path) -> Result<()> {
        match &self.root {
            Some(root) if root == path => Ok(()),
            Some(root) => Err(CovtreeError::cache_state(
                ErrorCode::CACHE_ROOT_CONFLICT,
                format!("root is already {}", root.display()),
                path,
            )),
            None => {
                if self.nodes.contains_key(path) {
                    return Err(CovtreeError::cache_state(
                        ErrorCode::CACHE_KIND_CONFLICT,
                        "path is already registered",
                        path,
                    ));
                }
                self.nodes
                    .insert(path.to_path_buf(), CoverageNode::folder(path, None));
                self.root = Some(path.to_path_buf());
                tracing::trace!("Registered coverage root {}", path.display());
                Ok(())
            }
        }
    }

    pub fn add_folder(&mut self, path: &Path, parent: &Path) -> Result<()> {
        self.require_folder(parent, path)?;

        if let Some(existing) = self.nodes.get(path) {
            if existing.is_folder() && existing.parent() == Some(parent) {
                return Ok(());
            }
            return Err(CovtreeError::cache_state(
                ErrorCode::CACHE_KIND_CONFLICT,
                "path is already registered elsewhere in the tree",
                path,
            ));
        }

        self.nodes
            .insert(path.to_path_buf(), CoverageNode::folder(path, Some(parent)));
        self.link_child(parent, path);
        Ok(())
    }

    /// Register a successfully analyzed file and update its ancestors
    pub fn add_file(
        &mut self,
        path: &Path,
        parent: &Path,
        statements: u64,
        missed: u64,
        missed_lines: impl Into<String>,
    ) -> Result<()> {
        self.insert_file(
            path,
            parent,
            FileCoverage::Covered {
                stats: CoverageStats::new(statements, missed),
                missed_lines: missed_lines.into(),
            },
        )
    }

    /// Register a file the tool failed to analyze; it adds nothing to aggregates
    pub fn add_file_error(
        &mut self,
        path: &Path,
        parent: &Path,
        message: impl Into<String>,
    ) -> Result<()> {
        self.insert_file(
            path,
            parent,
            FileCoverage::Failed {
                message: message.into(),
            },
        )
    }

    fn insert_file(&mut self, path: &Path, parent: &Path, coverage: FileCoverage) -> Result<()> {
        self.require_folder(parent, path)?;

        let added = coverage.contribution();
        let removed = match self.nodes.get_mut(path) {
            Some(existing) => {
                let NodeData::File(previous) = &existing.data else {
                    return Err(CovtreeError::cache_state(
                        ErrorCode::CACHE_KIND_CONFLICT,
                        "path is registered as a folder",
                        path,
                    ));
                };
                if existing.parent() != Some(parent) {
                    return Err(CovtreeError::cache_state(
                        ErrorCode::CACHE_KIND_CONFLICT,
                        "file is already registered under another folder",
                        path,
                    ));
                }
                let removed = previous.contribution();
                existing.data = NodeData::File(coverage);
                removed
            }
            None => {
                self.nodes.insert(
                    path.to_path_buf(),
                    CoverageNode {
                        path: path.to_path_buf(),
                        parent: Some(parent.to_path_buf()),
                        children: BTreeMap::new(),
                        data: NodeData::File(coverage),
                    },
                );
                self.link_child(parent, path);
                CoverageStats::default()
            }
        };

        self.propagate(parent, removed, added);
        Ok(())
    }

    /// Apply a file's change in contribution to every folder from `start` up to the root
    fn propagate(&mut self, start: &Path, removed: CoverageStats, added: CoverageStats) {
        if removed == added {
            return;
        }

        let mut current = Some(start.to_path_buf());
        while let Some(path) = current {
            let Some(node) = self.nodes.get_mut(&path) else {
                break;
            };
            if let NodeData::Folder { aggregate } = &mut node.data {
                *aggregate -= removed;
                *aggregate += added;
            }
            current = node.parent.clone();
        }
    }

    fn require_folder(&self, parent: &Path, child: &Path) -> Result<()> {
        match self.nodes.get(parent) {
            Some(node) if node.is_folder() => Ok(()),
            Some(_) => Err(CovtreeError::cache_state(
                ErrorCode::CACHE_KIND_CONFLICT,
                format!("parent {} is a file", parent.display()),
                child,
            )),
            None => Err(CovtreeError::cache_state(
                ErrorCode::CACHE_MISSING_PARENT,
                format!("parent folder {} is not registered", parent.display()),
                child,
            )),
        }
    }

    fn link_child(&mut self, parent: &Path, child: &Path) {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.insert(segment(child), child.to_path_buf());
        }
    }

    /// Own counts of a file or aggregated counts of a folder
    pub fn query(&self, path: &Path) -> Result<NodeSummary> {
        self.nodes
            .get(path)
            .map(CoverageNode::summary)
            .ok_or_else(|| CovtreeError::not_found(path))
    }

    /// Direct children of a folder, ordered by name
    pub fn children(&self, path: &Path) -> Result<Vec<&CoverageNode>> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| CovtreeError::not_found(path))?;
        Ok(node
            .children
            .values()
            .filter_map(|child| self.nodes.get(child))
            .collect())
    }

    /// Depth-first walk from the root, parents before children, children by name
    pub fn walk(&self) -> Vec<(usize, &CoverageNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, &CoverageNode)> = self.root().map(|r| (0, r)).into_iter().collect();

        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.children.values().rev() {
                if let Some(child) = self.nodes.get(child) {
                    stack.push((depth + 1, child));
                }
            }
        }
        out
    }
}

/// Cache shared between a collection pass and concurrent readers
pub type SharedCache = Arc<RwLock<CoverageCache>>;

pub fn shared() -> SharedCache {
    Arc::new(RwLock::new(CoverageCache::new()))
}

// A writer that panicked leaves the tree consistent up to its last record.
pub fn read_cache(cache: &RwLock<CoverageCache>) -> RwLockReadGuard<'_, CoverageCache> {
    cache.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write_cache(cache: &RwLock<CoverageCache>) -> RwLockWriteGuard<'_, CoverageCache> {
    cache.write().unwrap_or_else(PoisonError::into_inner)
}
