use super::CoverageConfig;
use crate::error::{CovtreeError, ErrorCode, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Per-project configuration file looked up in the collection root
pub const PROJECT_CONFIG_FILE: &str = ".covtree.toml";

/// Location of the user-wide configuration file
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "covtree", "covtree").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Layers configuration: defaults, global file, project file, explicit file, environment
pub struct ConfigLoader {
    global_path: Option<PathBuf>,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_path: global_config_path(),
            use_env: true,
        }
    }

    /// Loader with a fixed global file and no environment overrides
    pub fn isolated(global_path: Option<PathBuf>) -> Self {
        Self {
            global_path,
            use_env: false,
        }
    }

    pub async fn load(
        &self,
        project_root: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Result<CoverageConfig> {
        let mut config = CoverageConfig::new();

        if let Some(global) = &self.global_path {
            if global.is_file() {
                config.merge(read_config_file(global).await?);
                tracing::debug!("Loaded global configuration from {}", global.display());
            }
        }

        if let Some(root) = project_root {
            let project_file = root.join(PROJECT_CONFIG_FILE);
            if project_file.is_file() {
                config.merge(read_config_file(&project_file).await?);
                tracing::debug!(
                    "Loaded project configuration from {}",
                    project_file.display()
                );
            }
        }

        if let Some(path) = explicit {
            config.merge(read_config_file(path).await?);
            tracing::debug!("Loaded configuration from {}", path.display());
        }

        if self.use_env {
            config.merge_env_vars();
        }

        Ok(config)
    }
}

async fn read_config_file(path: &Path) -> Result<CoverageConfig> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        CovtreeError::config_with_code(ErrorCode::CONFIG_READ_FAILED, "cannot read file")
            .with_path(path)
            .with_source(e)
    })?;

    toml::from_str(&content).map_err(|e| {
        CovtreeError::config_with_code(ErrorCode::CONFIG_PARSE_ERROR, "invalid TOML")
            .with_path(path)
            .with_source(e)
    })
}
