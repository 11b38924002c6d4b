//! Native bundles: dynamic libraries built against `gcdesk-plugin-sdk`.
//!
//! Each bundle is mapped as its own library. On Unix it is opened with
//! `RTLD_NOW | RTLD_LOCAL`, so its symbols never resolve code in the host or
//! in sibling bundles.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gcdesk_plugin_sdk::{
    AggregationFactory, BundleDeclaration, PluginFactory, ServiceRegistrar, BUNDLE_ABI_VERSION,
    DECLARATION_SYMBOL, SDK_VERSION,
};
use libloading::Library;

use super::{BundleContext, BundleLoader, LoadedAggregation, PluginInstance, PluginProvider};
use crate::plugins::error::{LoaderError, Result};
use crate::plugins::fault;

/// Loader for native bundles (.so, .dylib, .dll).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBundleLoader;

impl NativeBundleLoader {
    pub fn new() -> Self {
        Self
    }
}

impl BundleLoader for NativeBundleLoader {
    fn bundle_extension(&self) -> &str {
        std::env::consts::DLL_EXTENSION
    }

    fn open(&self, path: &Path) -> Result<Box<dyn BundleContext>> {
        if !path.is_file() {
            return Err(LoaderError::Open(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let ext = path.extension().and_then(|e| e.to_str());
        if !ext.is_some_and(|e| e.eq_ignore_ascii_case(self.bundle_extension())) {
            return Err(LoaderError::Open(format!(
                "{} is not a native library file",
                path.display()
            )));
        }

        let canonical = path
            .canonicalize()
            .map_err(|e| LoaderError::Open(format!("{}: {}", path.display(), e)))?;

        // SAFETY: mapping a library runs its initializers. Bundles are
        // trusted code placed in the plug-in directory by the user.
        let library = unsafe { open_isolated(&canonical) }
            .map_err(|e| LoaderError::Open(e.to_string()))?;

        tracing::debug!(bundle = %path.display(), "Mapped native bundle");

        Ok(Box::new(NativeBundleContext {
            source: path.to_path_buf(),
            library: Some(Arc::new(library)),
            services: None,
        }))
    }
}

#[cfg(unix)]
unsafe fn open_isolated(path: &Path) -> std::result::Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL).map(Library::from)
}

#[cfg(windows)]
unsafe fn open_isolated(path: &Path) -> std::result::Result<Library, libloading::Error> {
    Library::new(path)
}

/// Isolation context backed by one mapped library.
struct NativeBundleContext {
    source: PathBuf,
    library: Option<Arc<Library>>,
    // Outcome of the bundle's registration function, computed on first lookup.
    services: Option<std::result::Result<ServiceTable, String>>,
}

impl NativeBundleContext {
    fn library(&self) -> Result<Arc<Library>> {
        self.library
            .clone()
            .ok_or_else(|| LoaderError::Open(format!("{} has been released", self.source.display())))
    }

    fn services(&mut self) -> Result<&ServiceTable> {
        let services = match self.services.take() {
            Some(services) => services,
            None => self.read_declaration(),
        };
        match self.services.insert(services) {
            Ok(table) => Ok(&*table),
            Err(reason) => Err(LoaderError::ServiceConfiguration(reason.clone())),
        }
    }

    fn read_declaration(&self) -> std::result::Result<ServiceTable, String> {
        let library = self
            .library
            .as_ref()
            .ok_or_else(|| "bundle has been released".to_string())?;

        // SAFETY: the symbol is a static `BundleDeclaration` exported by
        // `declare_bundle!`. The ABI version is checked before the rest of
        // the struct is read.
        let declaration = unsafe {
            let symbol = match library.get::<*const BundleDeclaration>(DECLARATION_SYMBOL) {
                Ok(symbol) => symbol,
                Err(e) => {
                    tracing::debug!(
                        bundle = %self.source.display(),
                        error = %e,
                        "Bundle exports no declaration"
                    );
                    return Ok(ServiceTable::default());
                }
            };
            let ptr: *const BundleDeclaration = *symbol;
            if ptr.is_null() {
                return Err("bundle declaration symbol is null".to_string());
            }
            let abi_version = std::ptr::addr_of!((*ptr).abi_version).read();
            if abi_version != BUNDLE_ABI_VERSION {
                return Err(format!(
                    "bundle ABI version mismatch: expected {}, found {}",
                    BUNDLE_ABI_VERSION, abi_version
                ));
            }
            *ptr
        };
        declaration.check_compatible()?;
        tracing::debug!(
            bundle = %self.source.display(),
            abi_version = declaration.abi_version,
            sdk_version = declaration.sdk_version,
            host_sdk_version = SDK_VERSION,
            "Read bundle declaration"
        );

        let mut table = ServiceTable::default();
        fault::guard(|| (declaration.register)(&mut table))
            .map_err(|panic| format!("service registration {}", panic))?;
        Ok(table)
    }
}

impl BundleContext for NativeBundleContext {
    fn source(&self) -> &Path {
        &self.source
    }

    fn plugin_providers(&mut self) -> Result<Vec<PluginProvider>> {
        let library = self.library()?;
        let table = self.services()?;
        validate_names("Plugin", table.plugins.iter().map(|(name, _)| name.as_str()))
            .map_err(LoaderError::ServiceConfiguration)?;

        Ok(table
            .plugins
            .iter()
            .map(|(name, factory)| {
                let factory = *factory;
                let library = library.clone();
                PluginProvider::new(name.clone(), move || {
                    Ok(PluginInstance::new(factory()?).with_keepalive(library))
                })
            })
            .collect())
    }

    fn aggregation_types(&mut self) -> Result<Vec<String>> {
        let table = self.services()?;
        validate_names(
            "Aggregation",
            table.aggregations.iter().map(|(name, _)| name.as_str()),
        )
        .map_err(LoaderError::ServiceConfiguration)?;

        Ok(table.aggregations.iter().map(|(name, _)| name.clone()).collect())
    }

    fn instantiate_aggregation(&mut self, type_name: &str) -> Result<LoadedAggregation> {
        let library = self.library()?;
        let table = self.services()?;
        let factory = table
            .aggregations
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, factory)| *factory)
            .ok_or_else(|| LoaderError::instantiation(type_name, "not declared by the bundle"))?;

        let aggregation =
            fault::call(factory).map_err(|reason| LoaderError::instantiation(type_name, reason))?;
        Ok(LoadedAggregation::new(type_name, aggregation).with_keepalive(library))
    }

    fn release(&mut self) -> Result<()> {
        // Factories point into the library.
        self.services = None;

        let Some(library) = self.library.take() else {
            return Ok(());
        };
        match Arc::try_unwrap(library) {
            Ok(library) => library.close().map_err(|e| LoaderError::Release {
                path: self.source.clone(),
                reason: e.to_string(),
            }),
            Err(_) => {
                tracing::debug!(
                    bundle = %self.source.display(),
                    "Instances still reference the bundle; unmapping when the last is dropped"
                );
                Ok(())
            }
        }
    }
}

impl Drop for NativeBundleContext {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::debug!(error = %e, "Failed to release bundle on drop");
        }
    }
}

/// Services recorded from a bundle's registration function.
#[derive(Default)]
struct ServiceTable {
    plugins: Vec<(String, PluginFactory)>,
    aggregations: Vec<(String, AggregationFactory)>,
}

impl ServiceRegistrar for ServiceTable {
    fn register_plugin(&mut self, type_name: &str, factory: PluginFactory) {
        self.plugins.push((type_name.to_string(), factory));
    }

    fn register_aggregation(&mut self, type_name: &str, factory: AggregationFactory) {
        self.aggregations.push((type_name.to_string(), factory));
    }
}

/// Type names must be non-blank and unique within one contract.
fn validate_names<'a>(
    contract: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(format!("blank type name declared for {}", contract));
        }
        if !seen.insert(name) {
            return Err(format!("{} declared twice for {}", name, contract));
        }
    }
    Ok(())
}
