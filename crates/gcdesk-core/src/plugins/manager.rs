//! Plug-in lifecycle manager.
//!
//! Loads every bundle of the configured directory on first use, gates each
//! candidate on its declared versions, initializes the compatible ones and
//! registers their aggregations with the host. A failing bundle only ever
//! produces a descriptor; it never prevents the host from starting.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::bundle::{BundleContext, BundleLoader, NativeBundleLoader, PluginInstance, PluginProvider};
use super::compat;
use super::descriptor::{PluginDescriptor, PluginMetadata, PluginStatus};
use super::error::LoaderError;
use super::fault;
use super::host::{AggregationHost, HostVersions};
use super::registry::PluginRegistry;
use super::scanner::BundleScanner;
use crate::config::PluginConfig;

const SCAN_FAILURE_ID: &str = "directory";
const SCAN_FAILURE_NAME: &str = "Plug-in directory";
const NO_SERVICES: &str = "Bundle declares no services: no extension services were found.";
const NO_AGGREGATIONS: &str = "No Aggregation services were exported by the plug-in.";
const CLOSED_BEFORE_LOAD: &str = "Plug-in manager was closed before loading; plug-in was not activated.";

type SharedContext = Arc<Mutex<Box<dyn BundleContext>>>;

/// Lazily loaded state.
#[derive(Default)]
enum LoadState {
    #[default]
    NotLoaded,
    Loaded(Arc<PluginRegistry>),
}

#[derive(Default)]
struct ManagerState {
    load: LoadState,
    active: Vec<ActivePlugin>,
    closed: bool,
}

/// An activated plug-in and the context its code lives in.
struct ActivePlugin {
    id: String,
    // Declared before the context so the instance is dropped first.
    instance: PluginInstance,
    context: SharedContext,
    aggregation_types: Vec<String>,
    source: PathBuf,
}

/// Snapshot of one active plug-in taken for registration.
struct RegistrationTarget {
    id: String,
    context: SharedContext,
    aggregation_types: Vec<String>,
}

/// Discovers, validates and activates plug-ins.
///
/// The first call to [`registry`](Self::registry) or
/// [`register_with`](Self::register_with) runs the whole load exactly once.
/// Concurrent first callers block until that load has finished.
pub struct PluginManager {
    config: PluginConfig,
    host: HostVersions,
    loader: Box<dyn BundleLoader>,
    state: Mutex<ManagerState>,
}

impl PluginManager {
    /// Manager loading native bundles.
    pub fn new(config: PluginConfig) -> Self {
        Self::with_loader(config, NativeBundleLoader::new())
    }

    /// Manager loading bundles through a custom loader.
    pub fn with_loader(config: PluginConfig, loader: impl BundleLoader + 'static) -> Self {
        let host = config.host_versions();
        Self {
            config,
            host,
            loader: Box::new(loader),
            state: Mutex::new(ManagerState::default()),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn host_versions(&self) -> &HostVersions {
        &self.host
    }

    /// Whether the directory has been loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(self.state.lock().load, LoadState::Loaded(_))
    }

    /// Registry of every discovered plug-in, loading it on first access.
    pub fn registry(&self) -> Arc<PluginRegistry> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state)
    }

    /// Instantiate the aggregations of every active plug-in and hand them to
    /// `host`.
    ///
    /// Failures are logged per aggregation and never abort the remaining
    /// ones. The state lock is only held while the active set is read, so
    /// `host` may call back into the manager. Returns the number of
    /// aggregations the host accepted.
    pub fn register_with(&self, host: &mut dyn AggregationHost) -> usize {
        let targets: Vec<RegistrationTarget> = {
            let mut state = self.state.lock();
            self.ensure_loaded(&mut state);
            state
                .active
                .iter()
                .map(|plugin| RegistrationTarget {
                    id: plugin.id.clone(),
                    context: plugin.context.clone(),
                    aggregation_types: plugin.aggregation_types.clone(),
                })
                .collect()
        };

        let mut accepted = 0;
        for target in targets {
            let RegistrationTarget {
                id,
                context,
                aggregation_types,
            } = target;
            for type_name in &aggregation_types {
                let created = fault::guard(|| context.lock().instantiate_aggregation(type_name));
                let aggregation = match created {
                    Ok(Ok(aggregation)) => aggregation,
                    Ok(Err(e)) => {
                        tracing::error!(plugin = %id, aggregation = %type_name, error = %e, "Failed to instantiate aggregation");
                        continue;
                    }
                    Err(panic) => {
                        tracing::error!(plugin = %id, aggregation = %type_name, error = %panic, "Aggregation constructor panicked");
                        continue;
                    }
                };

                match fault::guard(|| host.load_aggregation(aggregation)) {
                    Ok(Ok(())) => {
                        accepted += 1;
                        tracing::debug!(plugin = %id, aggregation = %type_name, "Registered aggregation");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(plugin = %id, aggregation = %type_name, error = %e, "Host rejected aggregation");
                    }
                    Err(panic) => {
                        tracing::error!(plugin = %id, aggregation = %type_name, error = %panic, "Host panicked while loading aggregation");
                    }
                }
            }

            // The plug-in may have been closed meanwhile.
            if let Some(context) = Arc::into_inner(context) {
                release_context(context.into_inner());
            }
        }
        accepted
    }

    /// Shut down every active plug-in in activation order and release its
    /// bundle. Later calls do nothing.
    pub fn close(&self) {
        let active = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.active)
        };
        if active.is_empty() {
            return;
        }

        tracing::info!(count = active.len(), "Closing plug-ins");
        for plugin in active {
            self.close_plugin(plugin);
        }
    }

    fn ensure_loaded(&self, state: &mut ManagerState) -> Arc<PluginRegistry> {
        if let LoadState::Loaded(registry) = &state.load {
            return registry.clone();
        }

        let closed = state.closed;
        let registry = Arc::new(self.load(closed, &mut state.active));
        state.load = LoadState::Loaded(registry.clone());
        registry
    }

    fn load(&self, closed: bool, active: &mut Vec<ActivePlugin>) -> PluginRegistry {
        let dir = &self.config.directory;
        tracing::info!(dir = %dir.display(), "Scanning plug-in directory");

        let scanner = BundleScanner::new(dir, self.loader.bundle_extension());
        let descriptors = self.load_bundles(scanner, closed, active);
        let registry = PluginRegistry::new(
            descriptors,
            self.host.api_version(),
            self.host.runtime_version(),
        );

        tracing::info!(
            total = registry.len(),
            active = registry.active_count(),
            failed = registry.failure_count(),
            incompatible = registry.incompatible_count(),
            "Plug-in registry ready"
        );
        registry
    }

    /// Evaluate every scanned bundle. A scan error ends the scan with one
    /// directory descriptor; descriptors already produced are kept.
    fn load_bundles(
        &self,
        entries: impl IntoIterator<Item = io::Result<PathBuf>>,
        closed: bool,
        active: &mut Vec<ActivePlugin>,
    ) -> Vec<PluginDescriptor> {
        let mut descriptors = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => descriptors.extend(self.load_bundle(&path, closed, active)),
                Err(e) => {
                    let dir = &self.config.directory;
                    tracing::error!(dir = %dir.display(), error = %e, "Unable to scan plug-in directory");
                    descriptors.push(PluginDescriptor::synthetic(
                        SCAN_FAILURE_ID,
                        SCAN_FAILURE_NAME,
                        self.host.api_version(),
                        self.host.runtime_version(),
                        LoaderError::Scan(e).to_string(),
                        dir,
                    ));
                    break;
                }
            }
        }
        descriptors
    }

    fn load_bundle(
        &self,
        path: &Path,
        closed: bool,
        active: &mut Vec<ActivePlugin>,
    ) -> Vec<PluginDescriptor> {
        let opened = fault::guard(|| self.loader.open(path))
            .unwrap_or_else(|panic| Err(LoaderError::Open(panic)));
        let mut context = match opened {
            Ok(context) => context,
            Err(e) => {
                tracing::error!(bundle = %path.display(), error = %e, "Unable to open plug-in bundle");
                return vec![self.bundle_failure(path, e.to_string())];
            }
        };

        let providers = match fault::guard(|| context.plugin_providers()) {
            Ok(Ok(providers)) => providers,
            Ok(Err(e)) => {
                let error = service_configuration(e);
                tracing::error!(bundle = %path.display(), error = %error, "Invalid plug-in configuration");
                release_context(context);
                return vec![self.bundle_failure(path, error.to_string())];
            }
            Err(panic) => {
                let error = LoaderError::ServiceConfiguration(panic);
                tracing::error!(bundle = %path.display(), error = %error, "Invalid plug-in configuration");
                release_context(context);
                return vec![self.bundle_failure(path, error.to_string())];
            }
        };

        if providers.is_empty() {
            tracing::warn!(bundle = %path.display(), "Plug-in bundle does not declare any services");
            release_context(context);
            return vec![self.bundle_failure(path, NO_SERVICES)];
        }

        let context: SharedContext = Arc::new(Mutex::new(context));
        let descriptors = providers
            .into_iter()
            .map(|provider| self.process_candidate(provider, &context, path, closed, active))
            .collect();

        // Still the only owner when no candidate was activated.
        if let Some(context) = Arc::into_inner(context) {
            release_context(context.into_inner());
        }
        descriptors
    }

    fn process_candidate(
        &self,
        provider: PluginProvider,
        context: &SharedContext,
        path: &Path,
        closed: bool,
        active: &mut Vec<ActivePlugin>,
    ) -> PluginDescriptor {
        let type_name = provider.type_name().to_string();
        let created = fault::call(|| {
            let instance = provider.get()?;
            let metadata = PluginMetadata::of(&*instance);
            Ok((instance, metadata))
        });
        let (mut instance, metadata) = match created {
            Ok(created) => created,
            Err(message) => {
                tracing::error!(bundle = %path.display(), plugin_type = %type_name, error = %message, "Failed to instantiate plug-in");
                return self.bundle_failure(path, LoaderError::PluginInstantiation(message).to_string());
            }
        };

        let verdict = compat::evaluate(&metadata, &self.host, self.config.unknown_host_version);
        let id = metadata.id.trim().to_string();
        if !verdict.is_eligible() {
            tracing::warn!(
                plugin = %id,
                status = %verdict.status,
                warnings = ?verdict.warnings,
                errors = ?verdict.errors,
                "Plug-in rejected by compatibility check"
            );
            dispose(&id, instance);
            return PluginDescriptor::new(
                metadata,
                verdict.status,
                Vec::new(),
                verdict.warnings,
                verdict.errors,
                path,
            );
        }

        let mut warnings = verdict.warnings;
        let mut errors = verdict.errors;

        if closed {
            tracing::warn!(plugin = %id, "Plug-in manager is closed; not activating plug-in");
            errors.push(CLOSED_BEFORE_LOAD.to_string());
            dispose(&id, instance);
            return PluginDescriptor::new(metadata, PluginStatus::Failed, Vec::new(), warnings, errors, path);
        }

        let started = Instant::now();
        let initialized = fault::call(|| instance.initialize());
        self.check_slow_hook("initialize", &id, started.elapsed());
        if let Err(message) = initialized {
            tracing::error!(plugin = %id, error = %message, "Plug-in failed to initialize");
            errors.push(LoaderError::Initialization(message).to_string());
            dispose(&id, instance);
            return PluginDescriptor::new(metadata, PluginStatus::Failed, Vec::new(), warnings, errors, path);
        }

        let aggregation_types = match fault::guard(|| context.lock().aggregation_types()) {
            Ok(Ok(types)) => distinct(types),
            Ok(Err(e)) => {
                tracing::error!(plugin = %id, error = %e, "Aggregation service lookup failed");
                errors.push(format!("Failed to inspect aggregations: {}", lookup_reason(e)));
                Vec::new()
            }
            Err(panic) => {
                tracing::error!(plugin = %id, error = %panic, "Aggregation service lookup panicked");
                errors.push(format!("Failed to inspect aggregations: {}", panic));
                Vec::new()
            }
        };
        if aggregation_types.is_empty() {
            warnings.push(NO_AGGREGATIONS.to_string());
        }

        let descriptor = PluginDescriptor::new(
            metadata,
            PluginStatus::Loaded,
            aggregation_types.clone(),
            warnings,
            errors,
            path,
        );
        tracing::info!(
            plugin = %descriptor.id(),
            version = %descriptor.version(),
            bundle = %path.display(),
            aggregations = aggregation_types.len(),
            "Loaded plug-in"
        );

        active.push(ActivePlugin {
            id: descriptor.id().to_string(),
            instance,
            context: context.clone(),
            aggregation_types,
            source: path.to_path_buf(),
        });
        descriptor
    }

    fn close_plugin(&self, plugin: ActivePlugin) {
        let ActivePlugin {
            id,
            mut instance,
            context,
            source,
            ..
        } = plugin;

        let started = Instant::now();
        if let Err(message) = fault::call(|| instance.close()) {
            tracing::warn!(plugin = %id, error = %message, "Plug-in failed to close cleanly");
        }
        self.check_slow_hook("close", &id, started.elapsed());
        dispose(&id, instance);

        // The last plug-in of a bundle releases it.
        if let Some(context) = Arc::into_inner(context) {
            release_context(context.into_inner());
        }
        tracing::debug!(plugin = %id, bundle = %source.display(), "Closed plug-in");
    }

    fn check_slow_hook(&self, hook: &str, id: &str, elapsed: Duration) {
        if elapsed > self.config.slow_hook_warning() {
            tracing::warn!(
                plugin = %id,
                hook,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow plug-in hook"
            );
        }
    }

    fn bundle_failure(&self, path: &Path, error: impl Into<String>) -> PluginDescriptor {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        PluginDescriptor::synthetic(
            &file_name,
            &file_name,
            self.host.api_version(),
            self.host.runtime_version(),
            error,
            path,
        )
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("config", &self.config)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

fn service_configuration(error: LoaderError) -> LoaderError {
    match error {
        LoaderError::ServiceConfiguration(_) => error,
        other => LoaderError::ServiceConfiguration(other.to_string()),
    }
}

fn lookup_reason(error: LoaderError) -> String {
    match error {
        LoaderError::ServiceConfiguration(reason) => reason,
        other => other.to_string(),
    }
}

fn distinct(types: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    types.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

fn dispose(id: &str, instance: PluginInstance) {
    if let Err(message) = fault::dispose(instance) {
        tracing::warn!(plugin = %id, error = %message, "Plug-in panicked while being dropped");
    }
}

fn release_context(mut context: Box<dyn BundleContext>) {
    let source = context.source().to_path_buf();
    match fault::guard(|| context.release()) {
        Ok(Ok(())) => tracing::debug!(bundle = %source.display(), "Released bundle"),
        Ok(Err(e)) => tracing::debug!(bundle = %source.display(), error = %e, "Failed to release bundle"),
        Err(panic) => tracing::debug!(bundle = %source.display(), error = %panic, "Bundle release panicked"),
    }
    if let Err(panic) = fault::dispose(context) {
        tracing::debug!(bundle = %source.display(), error = %panic, "Bundle context panicked while being dropped");
    }
}
