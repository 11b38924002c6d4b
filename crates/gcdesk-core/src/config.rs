//! Plug-in subsystem configuration.
//!
//! Read from TOML, then overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::plugins::compat::UnknownHostVersionPolicy;
use crate::plugins::host::HostVersions;

/// Default plug-in directory, relative to the working directory.
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Default threshold above which a lifecycle hook is reported as slow.
pub const DEFAULT_SLOW_HOOK_WARNING_MS: u64 = 5_000;

/// Environment variable names.
pub mod env_vars {
    pub const PLUGIN_DIR: &str = "GCDESK_PLUGIN_DIR";
    pub const HOST_VERSION: &str = "GCDESK_HOST_VERSION";
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings of the plug-in manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directory scanned for bundles.
    pub directory: PathBuf,

    /// Runtime version of the analysis engine, if known.
    pub host_version: Option<String>,

    /// Treatment of version-pinned plug-ins when the host version is unknown.
    pub unknown_host_version: UnknownHostVersionPolicy,

    /// Hooks slower than this are logged as warnings.
    pub slow_hook_warning_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_PLUGIN_DIR),
            host_version: None,
            unknown_host_version: UnknownHostVersionPolicy::default(),
            slow_hook_warning_ms: DEFAULT_SLOW_HOOK_WARNING_MS,
        }
    }
}

impl PluginConfig {
    /// Configuration scanning `directory` with default settings.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `GCDESK_PLUGIN_DIR` and `GCDESK_HOST_VERSION`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source. Blank values are
    /// ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());

        if let Some(dir) = lookup(env_vars::PLUGIN_DIR) {
            self.directory = PathBuf::from(dir);
        }
        if let Some(version) = lookup(env_vars::HOST_VERSION) {
            self.host_version = Some(version.trim().to_string());
        }
        self
    }

    /// Versions plug-ins are checked against.
    pub fn host_versions(&self) -> HostVersions {
        HostVersions::resolve(self.host_version.as_deref())
    }

    pub fn slow_hook_warning(&self) -> Duration {
        Duration::from_millis(self.slow_hook_warning_ms)
    }
}
