//! Primary and secondary extension contracts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PluginResult;

/// Plug-in API version published by the host.
///
/// A plug-in is only activated when its [`Plugin::target_api_version`] is
/// exactly this string.
pub const PLUGIN_API_VERSION: &str = "1.0";

/// Primary extension contract.
///
/// Every bundle must provide at least one implementation to be recognised as
/// a plug-in. Identifiers and versions should stay stable across releases so
/// the host can validate compatibility before activation.
pub trait Plugin: Send {
    /// Unique, stable identifier.
    fn id(&self) -> &str;

    /// Human-readable name for display purposes.
    fn name(&self) -> &str;

    /// Version of the plug-in implementation.
    fn version(&self) -> &str;

    /// Optional description surfaced in the UI.
    fn description(&self) -> &str {
        ""
    }

    /// Plug-in API version the bundle was compiled against.
    fn target_api_version(&self) -> &str;

    /// Host runtime version the plug-in requires.
    ///
    /// `"*"` or `"any"` opt out of the host version check.
    fn required_host_version(&self) -> &str;

    /// Called after compatibility checks pass and before any aggregation
    /// from the bundle is registered.
    fn initialize(&mut self) -> PluginResult<()> {
        Ok(())
    }

    /// Called once when the host shuts the plug-in subsystem down.
    fn close(&mut self) -> PluginResult<()> {
        Ok(())
    }
}

/// Secondary extension point: a unit of work consumed by the analysis
/// pipeline.
///
/// The host instantiates aggregations by the type name the bundle declared
/// and feeds them every parsed collection event.
pub trait Aggregation: Send {
    /// Short label shown in reports.
    fn label(&self) -> &str;

    /// Consume one collection event.
    fn accept(&mut self, event: &GcEvent);

    /// Summary rendered once the log has been fully consumed.
    fn summary(&self) -> Value {
        Value::Null
    }
}

/// One garbage collection event as seen by aggregations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcEvent {
    /// JVM uptime at the start of the event, in seconds.
    pub uptime_secs: f64,
    /// Collector-reported cause, e.g. `G1 Evacuation Pause`.
    pub cause: String,
    /// Stop-the-world pause duration in milliseconds.
    pub pause_ms: f64,
    /// Heap occupancy before the collection, in KiB.
    pub heap_before_kb: u64,
    /// Heap occupancy after the collection, in KiB.
    pub heap_after_kb: u64,
}

impl GcEvent {
    /// Amount of heap reclaimed by the collection, in KiB.
    pub fn reclaimed_kb(&self) -> u64 {
        self.heap_before_kb.saturating_sub(self.heap_after_kb)
    }
}
