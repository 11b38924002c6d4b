//! Plug-in system for GC Desk.
//!
//! Plug-ins are independently compiled bundles (.so/.dylib/.dll) dropped into
//! the plug-in directory. Each bundle is loaded in its own isolation context,
//! validated against the host versions and, when compatible, initialized and
//! allowed to contribute aggregations to the analysis pipeline.
//!
//! # Architecture
//!
//! ```text
//! BundleScanner ──► BundleLoader::open ──► BundleContext
//!                                              │ plugin_providers()
//!                                              ▼
//!                                      compat::evaluate
//!                                              │ Loaded
//!                                              ▼
//!                        initialize() ──► aggregation_types()
//!                                              │
//!                                              ▼
//!                     PluginRegistry ◄── PluginManager ──► AggregationHost
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use gcdesk_core::plugins::PluginManager;
//! use gcdesk_core::PluginConfig;
//!
//! let manager = PluginManager::new(PluginConfig::default().with_env_overrides());
//! for plugin in manager.registry().plugins() {
//!     println!("{} {} {}", plugin.status(), plugin.id(), plugin.version());
//! }
//! manager.register_with(&mut pipeline);
//! manager.close();
//! ```

pub mod bundle;
pub mod compat;
pub mod descriptor;
pub mod error;
mod fault;
pub mod host;
pub mod manager;
pub mod registry;
pub mod scanner;

pub use bundle::{
    BundleContext, BundleLoader, Keepalive, LoadedAggregation, NativeBundleLoader, PluginInstance,
    PluginProvider,
};
pub use compat::{evaluate, UnknownHostVersionPolicy, Verdict};
pub use descriptor::{DescriptorError, PluginDescriptor, PluginMetadata, PluginStatus};
pub use error::{LoaderError, Result};
pub use host::{AggregationHost, HostVersions, UNKNOWN_VERSION};
pub use manager::PluginManager;
pub use registry::PluginRegistry;
pub use scanner::BundleScanner;
