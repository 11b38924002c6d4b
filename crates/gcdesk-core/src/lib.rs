//! Plug-in host of the GC Desk log analysis desktop.
//!
//! Discovers extension bundles, isolates them from the host and from each
//! other, gates them on their declared versions and registers their
//! aggregations with the analysis pipeline.

pub mod config;
pub mod plugins;

pub use config::{ConfigError, PluginConfig};
pub use plugins::{
    AggregationHost, LoadedAggregation, LoaderError, PluginDescriptor, PluginManager,
    PluginRegistry, PluginStatus,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{env_vars, PluginConfig};
    pub use crate::plugins::{
        AggregationHost, HostVersions, LoadedAggregation, LoaderError, PluginDescriptor,
        PluginManager, PluginRegistry, PluginStatus, UnknownHostVersionPolicy,
    };
    pub use gcdesk_plugin_sdk::{Aggregation, GcEvent, Plugin, PLUGIN_API_VERSION};
}
