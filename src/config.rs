//! Configuration system.
//!
//! Loaded hierarchically from:
//! - `ram-datalog.toml` (default configuration)
//! - `ram-datalog.local.toml` (git-ignored local overrides)
//! - Environment variables (`RAM_DATALOG_*` prefix)
//!
//! ## Example
//!
//! ```toml
//! # ram-datalog.toml
//! [execution]
//! worker_threads = 8
//!
//! [execution.limits]
//! max_iterations = 100000
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! RAM_DATALOG_EXECUTION__WORKER_THREADS=4
//! ```

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            execution: ExecutionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Execution-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Worker threads for `PARALLEL` statements and outer-scan
    /// partitioning. `0` means "use `num_cpus::get()`".
    #[serde(default)]
    pub worker_threads: usize,

    /// Resource bounds the host may enforce between `LOOP` iterations.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            worker_threads: 0,
            limits: LimitsConfig::default(),
        }
    }
}

/// Soft bounds the host can use to poll a [`crate::interpreter::CancelToken`]
/// against; the core never reads these directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub max_iterations: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_iterations: None,
            timeout_ms: None,
        }
    }
}

/// Diagnostic sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `ram-datalog.toml`, `ram-datalog.local.toml`,
    /// and `RAM_DATALOG_*` environment overrides, falling back to
    /// [`EngineConfig::default`] for anything unset.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("ram-datalog.toml"))
            .merge(Toml::file("ram-datalog.local.toml"))
            .merge(Env::prefixed("RAM_DATALOG_").split("__"))
            .extract()
    }

    pub fn worker_threads(&self) -> usize {
        if self.execution.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.execution.worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_all_available_cpus() {
        let config = EngineConfig::default();
        assert_eq!(config.worker_threads(), num_cpus::get());
    }

    #[test]
    fn explicit_worker_threads_overrides_cpu_count() {
        let mut config = EngineConfig::default();
        config.execution.worker_threads = 2;
        assert_eq!(config.worker_threads(), 2);
    }
}
