//! Host-side collaborators of the plug-in manager.

use gcdesk_plugin_sdk::PLUGIN_API_VERSION;

use super::bundle::LoadedAggregation;
use super::error::Result;

/// Runtime version reported when the host cannot determine its own.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Versions plug-ins are validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostVersions {
    api_version: String,
    runtime_version: String,
}

impl HostVersions {
    pub fn new(api_version: impl Into<String>, runtime_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            runtime_version: runtime_version.into(),
        }
    }

    /// Host versions for the published plug-in API and an optional runtime
    /// version. A missing or blank runtime version becomes `unknown`.
    pub fn resolve(runtime_version: Option<&str>) -> Self {
        let runtime = runtime_version
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN_VERSION);
        Self::new(PLUGIN_API_VERSION, runtime)
    }

    /// Extension API version plug-ins must target.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Version of the running analysis runtime.
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }
}

impl Default for HostVersions {
    fn default() -> Self {
        Self::resolve(None)
    }
}

/// Analysis pipeline that accepts aggregations from plug-ins.
///
/// Duplicate registrations are passed through unchanged. The manager does
/// not hold its state lock while calling [`load_aggregation`], so an
/// implementation may query the manager (for example its registry) from
/// inside the call.
///
/// [`load_aggregation`]: AggregationHost::load_aggregation
pub trait AggregationHost {
    /// Take ownership of one aggregation instance.
    fn load_aggregation(&mut self, aggregation: LoadedAggregation) -> Result<()>;
}
