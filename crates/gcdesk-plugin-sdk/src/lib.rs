//! GC Desk Plug-in SDK
//!
//! Contracts shared by the GC Desk host and the plug-in bundles it loads.
//!
//! A bundle is a `cdylib` crate that implements [`Plugin`] (the primary
//! contract every bundle must offer to be recognised at all) and, optionally,
//! [`Aggregation`] (the extension point the analysis pipeline instantiates
//! by name). Bundles export their services with [`declare_bundle!`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gcdesk_plugin_sdk::prelude::*;
//!
//! #[derive(Default)]
//! struct PauseHistogramPlugin;
//!
//! impl Plugin for PauseHistogramPlugin {
//!     fn id(&self) -> &str { "pause-histogram" }
//!     fn name(&self) -> &str { "Pause histogram" }
//!     fn version(&self) -> &str { "0.1.0" }
//!     fn target_api_version(&self) -> &str { PLUGIN_API_VERSION }
//!     fn required_host_version(&self) -> &str { "*" }
//! }
//!
//! declare_bundle! {
//!     plugins: [PauseHistogramPlugin],
//!     aggregations: [PauseHistogram],
//! }
//! ```

pub mod contract;
pub mod declaration;
pub mod error;
#[macro_use]
pub mod macros;

pub use contract::{Aggregation, GcEvent, Plugin, PLUGIN_API_VERSION};
pub use declaration::{
    AggregationFactory, BundleDeclaration, PluginFactory, ServiceRegistrar, BUNDLE_ABI_VERSION,
    DECLARATION_SYMBOL, RUSTC_VERSION, SDK_VERSION,
};
pub use error::{PluginError, PluginResult};

/// Prelude module with common imports
pub mod prelude {
    pub use crate::contract::{Aggregation, GcEvent, Plugin, PLUGIN_API_VERSION};
    pub use crate::error::{PluginError, PluginResult};
    pub use serde_json::{json, Value};
}
