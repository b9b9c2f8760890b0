use crate::error::{CovtreeError, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod loader;

pub use loader::ConfigLoader;

/// Name of the coverage data file kept in the data directory
pub const COVERAGE_FILE_NAME: &str = ".coverage";

pub const DEFAULT_EXTENSIONS: &[&str] = &["py", "pyw"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub tool: ToolConfig,
    pub scan: ScanConfig,
}

/// How to invoke the external coverage tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub interpreter: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub erase_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub extensions: Option<Vec<String>>,
}

/// Validated tool invocation settings
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub interpreter: PathBuf,
    pub script: PathBuf,
    pub data_dir: PathBuf,
    pub erase_timeout: Option<Duration>,
}

impl ToolSettings {
    pub fn new(
        interpreter: impl Into<PathBuf>,
        script: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            data_dir: data_dir.into(),
            erase_timeout: None,
        }
    }

    pub fn coverage_file(&self) -> PathBuf {
        self.data_dir.join(COVERAGE_FILE_NAME)
    }

    /// Coverage file location wrapped in double quotes, as the tool expects it
    pub fn quoted_coverage_file(&self) -> String {
        format!("\"{}\"", self.coverage_file().display())
    }
}

impl CoverageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay `other` on top of this configuration; values set in `other` win
    pub fn merge(&mut self, other: CoverageConfig) {
        let CoverageConfig { tool, scan } = other;
        if tool.interpreter.is_some() {
            self.tool.interpreter = tool.interpreter;
        }
        if tool.script.is_some() {
            self.tool.script = tool.script;
        }
        if tool.data_dir.is_some() {
            self.tool.data_dir = tool.data_dir;
        }
        if tool.erase_timeout_secs.is_some() {
            self.tool.erase_timeout_secs = tool.erase_timeout_secs;
        }
        if scan.extensions.is_some() {
            self.scan.extensions = scan.extensions;
        }
    }

    pub fn merge_env_vars(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    fn merge_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(interpreter) = lookup("COVTREE_INTERPRETER") {
            self.tool.interpreter = Some(PathBuf::from(interpreter));
        }

        if let Some(script) = lookup("COVTREE_SCRIPT") {
            self.tool.script = Some(PathBuf::from(script));
        }

        if let Some(data_dir) = lookup("COVTREE_DATA_DIR") {
            self.tool.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Some(extensions) = lookup("COVTREE_EXTENSIONS") {
            self.scan.extensions = Some(
                extensions
                    .split(',')
                    .map(str::trim)
                    .filter(|ext| !ext.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
    }

    pub fn extensions(&self) -> Vec<String> {
        self.scan.extensions.clone().unwrap_or_else(|| {
            DEFAULT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect()
        })
    }

    /// Resolve the settings needed to start the tool.
    ///
    /// The data directory defaults to the directory holding the script.
    pub fn tool_settings(&self) -> Result<ToolSettings> {
        let interpreter = self.tool.interpreter.clone().ok_or_else(|| {
            CovtreeError::config_with_code(
                ErrorCode::CONFIG_MISSING_INTERPRETER,
                "no interpreter configured (set tool.interpreter or COVTREE_INTERPRETER)",
            )
        })?;

        let script = self.tool.script.clone().ok_or_else(|| {
            CovtreeError::config_with_code(
                ErrorCode::CONFIG_MISSING_SCRIPT,
                "no analysis script configured (set tool.script or COVTREE_SCRIPT)",
            )
        })?;

        if !script.is_file() {
            return Err(CovtreeError::config_with_code(
                ErrorCode::CONFIG_MISSING_SCRIPT,
                format!("analysis script {} does not exist", script.display()),
            ));
        }

        let data_dir = match &self.tool.data_dir {
            Some(dir) => dir.clone(),
            None => script
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    CovtreeError::config_with_code(
                        ErrorCode::CONFIG_MISSING_DATA_DIR,
                        "no coverage data directory configured (set tool.data_dir or COVTREE_DATA_DIR)",
                    )
                })?,
        };

        Ok(ToolSettings {
            interpreter,
            script,
            data_dir,
            erase_timeout: self.tool.erase_timeout_secs.map(Duration::from_secs),
        })
    }
}
