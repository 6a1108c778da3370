//! Pipeline-instance configuration.
//!
//! A [`LogConfiguration`] is both the input to instance construction and the
//! identity the [`InstanceRegistry`](crate::registry::InstanceRegistry) compares
//! when a module is acquired again: `module_name` is the registry key and
//! whole-struct equality decides whether two acquisitions agree.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Module name used when none is configured.
pub const DEFAULT_MODULE_NAME: &str = "default";

/// Seconds an instance may spend flushing during teardown, by default.
pub const DEFAULT_MAX_TEARDOWN_SECS: u64 = 1;

/// Configuration of one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfiguration {
    /// Registry key
    pub module_name: String,
    /// Module semver
    pub version: String,
    /// Owner module for host/guest sharing
    pub host: Option<String>,
    /// Ingestion tenant token
    pub tenant_token: Option<String>,
    /// Offline storage path, interpreted by the pipeline
    pub cache_file_path: Option<String>,
    /// Teardown flush budget in seconds
    pub max_teardown_time: u64,
    /// Free-form settings passed through to the pipeline
    pub extra: BTreeMap<String, String>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            module_name: DEFAULT_MODULE_NAME.to_string(),
            version: String::new(),
            host: None,
            tenant_token: None,
            cache_file_path: None,
            max_teardown_time: DEFAULT_MAX_TEARDOWN_SECS,
            extra: BTreeMap::new(),
        }
    }
}

impl LogConfiguration {
    /// Create a new builder
    pub fn builder() -> LogConfigurationBuilder {
        LogConfigurationBuilder::new()
    }

    /// Default configuration for a bare module name.
    pub fn for_module(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Self::default()
        }
    }

    /// Teardown flush budget as a [`Duration`]
    pub fn teardown_budget(&self) -> Duration {
        Duration::from_secs(self.max_teardown_time)
    }

    /// Tenant id: the token prefix before the first `-`.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_token
            .as_deref()
            .map(|token| token.split('-').next().unwrap_or(token))
    }
}

/// Builder for LogConfiguration
#[derive(Debug, Default)]
pub struct LogConfigurationBuilder {
    config: LogConfiguration,
}

impl LogConfigurationBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry key
    pub fn module_name(mut self, name: impl Into<String>) -> Self {
        self.config.module_name = name.into();
        self
    }

    /// Set the module version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Set the owner module
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    /// Set the ingestion tenant token
    pub fn tenant_token(mut self, token: impl Into<String>) -> Self {
        self.config.tenant_token = Some(token.into());
        self
    }

    /// Set the offline storage path
    pub fn cache_file_path(mut self, path: impl Into<String>) -> Self {
        self.config.cache_file_path = Some(path.into());
        self
    }

    /// Set the teardown flush budget in seconds
    pub fn max_teardown_time(mut self, secs: u64) -> Self {
        self.config.max_teardown_time = secs;
        self
    }

    /// Add a pass-through setting
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.extra.insert(key.into(), value.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> LogConfiguration {
        self.config
    }
}
