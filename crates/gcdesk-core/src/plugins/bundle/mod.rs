//! Bundle isolation contexts and service discovery.
//!
//! A [`BundleLoader`] opens one [`BundleContext`] per bundle file. The
//! context owns everything loaded from that bundle and answers service
//! lookups for the primary [`Plugin`] contract and the [`Aggregation`]
//! extension point.

pub mod native;

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use gcdesk_plugin_sdk::{Aggregation, Plugin, PluginResult};

use super::error::Result;

pub use native::NativeBundleLoader;

/// Handle that keeps a bundle's code mapped while an instance created from
/// it is alive.
pub type Keepalive = Arc<dyn Any + Send + Sync>;

/// Opens isolation contexts for bundle files.
pub trait BundleLoader: Send + Sync {
    /// File extension of the bundles this loader understands, without dot.
    fn bundle_extension(&self) -> &str;

    /// Establish an isolated namespace for the bundle at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn BundleContext>>;
}

/// Isolated namespace holding the code of one bundle.
///
/// Lookups are answered per contract: a malformed declaration for one
/// contract does not affect lookups for the other.
pub trait BundleContext: Send {
    /// Path of the bundle this context was opened for.
    fn source(&self) -> &Path;

    /// Providers of the primary plug-in contract, in declaration order.
    fn plugin_providers(&mut self) -> Result<Vec<PluginProvider>>;

    /// Type names of the aggregations the bundle declares, in declaration
    /// order.
    fn aggregation_types(&mut self) -> Result<Vec<String>>;

    /// Create an aggregation by type name inside this context.
    fn instantiate_aggregation(&mut self, type_name: &str) -> Result<LoadedAggregation>;

    /// Release the namespace. Calling it again is a no-op.
    fn release(&mut self) -> Result<()>;
}

type PluginConstructor = Box<dyn FnOnce() -> PluginResult<PluginInstance> + Send>;

/// Deferred constructor for one plug-in candidate.
pub struct PluginProvider {
    type_name: String,
    constructor: PluginConstructor,
}

impl PluginProvider {
    pub fn new(
        type_name: impl Into<String>,
        constructor: impl FnOnce() -> PluginResult<PluginInstance> + Send + 'static,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            constructor: Box::new(constructor),
        }
    }

    /// Type name the bundle declared for this candidate.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Materialize the candidate.
    pub fn get(self) -> PluginResult<PluginInstance> {
        (self.constructor)()
    }
}

impl fmt::Debug for PluginProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginProvider")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A plug-in instance together with the bundle code backing it.
pub struct PluginInstance {
    // Declared before the keepalive so the instance is dropped first.
    plugin: Box<dyn Plugin>,
    _keepalive: Option<Keepalive>,
}

impl PluginInstance {
    pub fn new(plugin: Box<dyn Plugin>) -> Self {
        Self {
            plugin,
            _keepalive: None,
        }
    }

    pub fn with_keepalive(mut self, keepalive: Keepalive) -> Self {
        self._keepalive = Some(keepalive);
        self
    }
}

impl Deref for PluginInstance {
    type Target = dyn Plugin;

    fn deref(&self) -> &Self::Target {
        self.plugin.as_ref()
    }
}

impl DerefMut for PluginInstance {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.plugin.as_mut()
    }
}

/// An aggregation handed to the host, together with the bundle code
/// backing it.
pub struct LoadedAggregation {
    // Declared before the keepalive so the instance is dropped first.
    aggregation: Box<dyn Aggregation>,
    type_name: String,
    _keepalive: Option<Keepalive>,
}

impl LoadedAggregation {
    pub fn new(type_name: impl Into<String>, aggregation: Box<dyn Aggregation>) -> Self {
        Self {
            aggregation,
            type_name: type_name.into(),
            _keepalive: None,
        }
    }

    pub fn with_keepalive(mut self, keepalive: Keepalive) -> Self {
        self._keepalive = Some(keepalive);
        self
    }

    /// Type name the aggregation was declared under.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl Deref for LoadedAggregation {
    type Target = dyn Aggregation;

    fn deref(&self) -> &Self::Target {
        self.aggregation.as_ref()
    }
}

impl DerefMut for LoadedAggregation {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.aggregation.as_mut()
    }
}

impl fmt::Debug for LoadedAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAggregation")
            .field("type_name", &self.type_name)
            .field("label", &self.aggregation.label())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcdesk_plugin_sdk::GcEvent;

    struct Counter(u32);

    impl Aggregation for Counter {
        fn label(&self) -> &str {
            "counter"
        }

        fn accept(&mut self, _event: &GcEvent) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_keepalive_outlives_instance() {
        let keepalive: Keepalive = Arc::new(());
        let aggregation = LoadedAggregation::new("demo::Counter", Box::new(Counter(0)))
            .with_keepalive(keepalive.clone());
        assert_eq!(Arc::strong_count(&keepalive), 2);
        assert_eq!(aggregation.type_name(), "demo::Counter");
        assert_eq!(aggregation.label(), "counter");

        drop(aggregation);
        assert_eq!(Arc::strong_count(&keepalive), 1);
    }

    #[test]
    fn test_aggregation_derefs_mutably() {
        let mut aggregation = LoadedAggregation::new("demo::Counter", Box::new(Counter(0)));
        aggregation.accept(&GcEvent {
            uptime_secs: 1.0,
            cause: "Allocation Failure".to_string(),
            pause_ms: 1.0,
            heap_before_kb: 10,
            heap_after_kb: 5,
        });
        assert!(format!("{:?}", aggregation).contains("demo::Counter"));
    }

    #[test]
    fn test_provider_materializes_once() {
        let provider = PluginProvider::new("demo::Broken", || {
            Err(gcdesk_plugin_sdk::PluginError::msg("missing license"))
        });
        assert_eq!(provider.type_name(), "demo::Broken");
        let err = provider.get().err().unwrap();
        assert_eq!(err.to_string(), "missing license");
    }
}
