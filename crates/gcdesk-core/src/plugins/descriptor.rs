//! Plug-in descriptors and status.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Id used when a plug-in reports a blank identifier.
pub const UNNAMED_PLUGIN_ID: &str = "Unnamed plug-in";

/// Version shown when a plug-in reports none.
pub const NO_VERSION: &str = "-";

/// Terminal state of one discovered plug-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginStatus {
    /// Activated, initialized and registered.
    Loaded,
    /// Rejected by the compatibility gate before initialization.
    Incompatible,
    /// An error occurred at some stage.
    Failed,
}

impl PluginStatus {
    /// Stable token used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "LOADED",
            Self::Incompatible => "INCOMPATIBLE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Descriptor errors.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity a plug-in declares about itself.
///
/// Used both as input to the compatibility gate and to build descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub target_api_version: String,
    pub required_host_version: String,
}

impl PluginMetadata {
    /// Capture the metadata a plug-in instance reports.
    pub fn of(plugin: &dyn gcdesk_plugin_sdk::Plugin) -> Self {
        Self {
            id: plugin.id().to_string(),
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
            description: plugin.description().to_string(),
            target_api_version: plugin.target_api_version().to_string(),
            required_host_version: plugin.required_host_version().to_string(),
        }
    }
}

/// Immutable record of one discovered plug-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    id: String,
    name: String,
    version: String,
    description: String,
    target_api_version: String,
    required_host_version: String,
    status: PluginStatus,
    provided_aggregations: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    source: PathBuf,
}

impl PluginDescriptor {
    /// Build a descriptor, sanitising the declared identity.
    ///
    /// Values are trimmed. A blank id becomes [`UNNAMED_PLUGIN_ID`], a blank
    /// name falls back to the id and a blank version to [`NO_VERSION`].
    pub fn new(
        metadata: PluginMetadata,
        status: PluginStatus,
        provided_aggregations: Vec<String>,
        warnings: Vec<String>,
        errors: Vec<String>,
        source: impl Into<PathBuf>,
    ) -> Self {
        let id = non_blank(&metadata.id).unwrap_or(UNNAMED_PLUGIN_ID).to_string();
        let name = non_blank(&metadata.name).unwrap_or(&id).to_string();
        let version = non_blank(&metadata.version).unwrap_or(NO_VERSION).to_string();

        Self {
            id,
            name,
            version,
            description: metadata.description.trim().to_string(),
            target_api_version: metadata.target_api_version.trim().to_string(),
            required_host_version: metadata.required_host_version.trim().to_string(),
            status,
            provided_aggregations,
            warnings,
            errors,
            source: source.into(),
        }
    }

    /// Synthetic descriptor for a bundle or directory that produced no
    /// usable plug-in.
    ///
    /// `host_api` and `host_runtime` are recorded as the declared versions
    /// so diagnostics show what the host expected.
    pub fn synthetic(
        id: &str,
        name: &str,
        host_api: &str,
        host_runtime: &str,
        error: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Self {
        let metadata = PluginMetadata {
            id: id.to_string(),
            name: name.to_string(),
            version: NO_VERSION.to_string(),
            description: String::new(),
            target_api_version: host_api.to_string(),
            required_host_version: host_runtime.to_string(),
        };
        Self::new(
            metadata,
            PluginStatus::Failed,
            Vec::new(),
            Vec::new(),
            vec![error.into()],
            source,
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn target_api_version(&self) -> &str {
        &self.target_api_version
    }

    pub fn required_host_version(&self) -> &str {
        &self.required_host_version
    }

    pub fn status(&self) -> PluginStatus {
        self.status
    }

    /// Aggregation type names, in discovery order.
    pub fn provided_aggregations(&self) -> &[String] {
        &self.provided_aggregations
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Path of the bundle the plug-in came from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Whether the plug-in was activated.
    pub fn is_active(&self) -> bool {
        self.status == PluginStatus::Loaded
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
