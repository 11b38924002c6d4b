//! Immutable registry of discovered plug-ins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::descriptor::{DescriptorError, PluginDescriptor, PluginStatus};

/// Result of one load: every descriptor plus the host versions they were
/// evaluated against.
///
/// Created once per load and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRegistry {
    plugins: Vec<PluginDescriptor>,
    api_version: String,
    host_version: String,
    loaded_at: DateTime<Utc>,
}

impl PluginRegistry {
    pub fn new(
        plugins: Vec<PluginDescriptor>,
        api_version: impl Into<String>,
        host_version: impl Into<String>,
    ) -> Self {
        Self {
            plugins,
            api_version: api_version.into(),
            host_version: host_version.into(),
            loaded_at: Utc::now(),
        }
    }

    /// All descriptors in discovery order.
    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    /// Extension API version of the host.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Runtime version of the host, or `unknown`.
    pub fn host_version(&self) -> &str {
        &self.host_version
    }

    /// When the registry was built.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Number of activated plug-ins.
    pub fn active_count(&self) -> usize {
        self.count(PluginStatus::Loaded)
    }

    /// Number of plug-ins that failed at some stage.
    pub fn failure_count(&self) -> usize {
        self.count(PluginStatus::Failed)
    }

    /// Number of plug-ins rejected by the compatibility gate.
    pub fn incompatible_count(&self) -> usize {
        self.count(PluginStatus::Incompatible)
    }

    /// First descriptor with the given id.
    pub fn find(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|p| p.id() == id)
    }

    /// Activated plug-ins.
    pub fn active(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.iter().filter(|p| p.is_active())
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn count(&self, status: PluginStatus) -> usize {
        self.plugins.iter().filter(|p| p.status() == status).count()
    }
}
