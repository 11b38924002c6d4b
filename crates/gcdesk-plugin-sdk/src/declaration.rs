//! Bundle declaration exported by native plug-in libraries.
//!
//! Every bundle exports a static named `gcdesk_bundle_declaration` holding a
//! [`BundleDeclaration`]. The host reads it after mapping the library, checks
//! the ABI and compiler versions, then calls [`BundleDeclaration::register`]
//! with a [`ServiceRegistrar`] that records the bundle's services.
//!
//! Bundles and host exchange Rust trait objects, so both sides must be built
//! with the same compiler and SDK ABI version.

use crate::contract::{Aggregation, Plugin};
use crate::error::PluginResult;

/// Current bundle ABI version.
/// Incremented when the layout of [`BundleDeclaration`] changes.
pub const BUNDLE_ABI_VERSION: u32 = 1;

/// Version of the compiler that built this SDK.
pub const RUSTC_VERSION: &str = env!("GCDESK_RUSTC_VERSION");

/// Version of this SDK crate.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Symbol name of the exported declaration (NUL-terminated).
pub const DECLARATION_SYMBOL: &[u8] = b"gcdesk_bundle_declaration\0";

/// Constructor for a primary plug-in instance.
pub type PluginFactory = fn() -> PluginResult<Box<dyn Plugin>>;

/// Constructor for an aggregation instance.
pub type AggregationFactory = fn() -> PluginResult<Box<dyn Aggregation>>;

/// Sink for the services a bundle declares.
///
/// Type names are the keys the host uses to instantiate services later, so
/// they must be non-blank and unique per contract.
pub trait ServiceRegistrar {
    /// Declare an implementation of the primary [`Plugin`] contract.
    fn register_plugin(&mut self, type_name: &str, factory: PluginFactory);

    /// Declare an implementation of the [`Aggregation`] extension point.
    fn register_aggregation(&mut self, type_name: &str, factory: AggregationFactory);
}

/// Declaration exported by a bundle.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BundleDeclaration {
    /// ABI version - must match [`BUNDLE_ABI_VERSION`]
    pub abi_version: u32,

    /// Compiler version the bundle was built with
    pub rustc_version: &'static str,

    /// SDK version the bundle was built against
    pub sdk_version: &'static str,

    /// Registers every service of the bundle, in declaration order
    pub register: fn(&mut dyn ServiceRegistrar),
}

impl BundleDeclaration {
    /// Check the declaration against the host's ABI and compiler versions.
    pub fn check_compatible(&self) -> Result<(), String> {
        if self.abi_version != BUNDLE_ABI_VERSION {
            return Err(format!(
                "bundle ABI version mismatch: expected {}, found {}",
                BUNDLE_ABI_VERSION, self.abi_version
            ));
        }
        if self.rustc_version != RUSTC_VERSION {
            return Err(format!(
                "bundle was built with {} but host was built with {}",
                self.rustc_version, RUSTC_VERSION
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for BundleDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleDeclaration")
            .field("abi_version", &self.abi_version)
            .field("rustc_version", &self.rustc_version)
            .field("sdk_version", &self.sdk_version)
            .finish_non_exhaustive()
    }
}
