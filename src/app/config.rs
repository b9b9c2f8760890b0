//! Application configuration

/// Environment variable holding a full filter directive, e.g. `covtree=trace`
pub const LOG_ENV_VAR: &str = "COVTREE_LOG";

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Show progress on the terminal while collecting
    pub show_progress: bool,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Filter directive to install; `COVTREE_LOG` wins over `-v`
    pub fn log_filter(&self) -> String {
        self.log_filter_from(std::env::var(LOG_ENV_VAR).ok())
    }

    fn log_filter_from(&self, override_filter: Option<String>) -> String {
        override_filter
            .filter(|filter| !filter.trim().is_empty())
            .unwrap_or_else(|| self.log_level().to_string())
    }
}
