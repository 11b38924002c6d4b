//! In-memory bundle loader.
//!
//! Bundles are registered by file name and backed by empty files on disk, so
//! the real directory scanner drives the manager while the bundle content is
//! scripted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gcdesk_core::plugins::{
    BundleContext, BundleLoader, LoadedAggregation, LoaderError, PluginInstance, PluginProvider,
    Result,
};
use gcdesk_plugin_sdk::PluginError;
use parking_lot::Mutex;

use crate::journal::Journal;
use crate::scripted::{RecordingAggregation, ScriptedPlugin};

/// File extension of fake bundles.
pub const FAKE_BUNDLE_EXTENSION: &str = "gcp";

#[derive(Debug, Clone)]
enum Candidate {
    Plugin(ScriptedPlugin),
    FailingConstructor(String),
    PanickingConstructor(String),
}

#[derive(Debug, Clone)]
enum Constructor {
    Succeed,
    Fail(String),
    Panic(String),
}

/// Scripted content of one bundle.
#[derive(Debug, Clone, Default)]
pub struct FakeBundle {
    open_error: Option<String>,
    plugin_lookup_error: Option<String>,
    aggregation_lookup_error: Option<String>,
    candidates: Vec<Candidate>,
    aggregations: Vec<(String, Constructor)>,
}

impl FakeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin(mut self, plugin: ScriptedPlugin) -> Self {
        self.candidates.push(Candidate::Plugin(plugin));
        self
    }

    /// A candidate whose constructor returns an error.
    pub fn with_failing_constructor(mut self, message: impl Into<String>) -> Self {
        self.candidates.push(Candidate::FailingConstructor(message.into()));
        self
    }

    /// A candidate whose constructor panics.
    pub fn with_panicking_constructor(mut self, message: impl Into<String>) -> Self {
        self.candidates.push(Candidate::PanickingConstructor(message.into()));
        self
    }

    pub fn with_aggregation(mut self, type_name: impl Into<String>) -> Self {
        self.aggregations.push((type_name.into(), Constructor::Succeed));
        self
    }

    pub fn with_failing_aggregation(
        mut self,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.aggregations
            .push((type_name.into(), Constructor::Fail(message.into())));
        self
    }

    pub fn with_panicking_aggregation(
        mut self,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.aggregations
            .push((type_name.into(), Constructor::Panic(message.into())));
        self
    }

    /// Opening the bundle fails.
    pub fn with_open_error(mut self, reason: impl Into<String>) -> Self {
        self.open_error = Some(reason.into());
        self
    }

    /// Primary service lookup reports a malformed declaration.
    pub fn with_plugin_lookup_error(mut self, reason: impl Into<String>) -> Self {
        self.plugin_lookup_error = Some(reason.into());
        self
    }

    /// Aggregation service lookup reports a malformed declaration.
    pub fn with_aggregation_lookup_error(mut self, reason: impl Into<String>) -> Self {
        self.aggregation_lookup_error = Some(reason.into());
        self
    }
}

#[derive(Debug, Default)]
struct LoaderState {
    bundles: HashMap<String, FakeBundle>,
    opened: HashMap<String, usize>,
    released: HashMap<String, usize>,
}

/// Bundle loader serving scripted bundles.
///
/// Clones share their bundles, counters and journal, so a test keeps one
/// clone for inspection after handing another to the manager.
#[derive(Debug, Clone, Default)]
pub struct FakeBundleLoader {
    state: Arc<Mutex<LoaderState>>,
    journal: Journal,
}

impl FakeBundleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bundle` under `<stem>.gcp` and create that file in `dir`.
    pub fn install(
        &self,
        dir: &Path,
        stem: &str,
        bundle: FakeBundle,
    ) -> std::io::Result<PathBuf> {
        let file_name = format!("{}.{}", stem, FAKE_BUNDLE_EXTENSION);
        let path = dir.join(&file_name);
        std::fs::write(&path, b"")?;
        self.state.lock().bundles.insert(file_name, bundle);
        Ok(path)
    }

    /// Lifecycle events of everything this loader created.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Successful opens of the bundle with the given file name.
    pub fn open_count(&self, file_name: &str) -> usize {
        self.state.lock().opened.get(file_name).copied().unwrap_or(0)
    }

    /// Calls to `release` for the bundle with the given file name.
    pub fn release_count(&self, file_name: &str) -> usize {
        self.state.lock().released.get(file_name).copied().unwrap_or(0)
    }

    /// Total successful opens.
    pub fn total_opens(&self) -> usize {
        self.state.lock().opened.values().sum()
    }

    /// Total calls to `release`.
    pub fn total_releases(&self) -> usize {
        self.state.lock().released.values().sum()
    }
}

impl BundleLoader for FakeBundleLoader {
    fn bundle_extension(&self) -> &str {
        FAKE_BUNDLE_EXTENSION
    }

    fn open(&self, path: &Path) -> Result<Box<dyn BundleContext>> {
        let file_name = file_name(path);
        let mut state = self.state.lock();
        let bundle = state
            .bundles
            .get(&file_name)
            .cloned()
            .ok_or_else(|| LoaderError::Open(format!("no fake bundle named {}", file_name)))?;
        if let Some(reason) = &bundle.open_error {
            return Err(LoaderError::Open(reason.clone()));
        }

        *state.opened.entry(file_name.clone()).or_default() += 1;
        tracing::debug!(bundle = %file_name, "Opened fake bundle");

        Ok(Box::new(FakeContext {
            source: path.to_path_buf(),
            file_name,
            bundle,
            state: self.state.clone(),
            journal: self.journal.clone(),
            released: false,
        }))
    }
}

struct FakeContext {
    source: PathBuf,
    file_name: String,
    bundle: FakeBundle,
    state: Arc<Mutex<LoaderState>>,
    journal: Journal,
    released: bool,
}

impl FakeContext {
    fn ensure_open(&self) -> Result<()> {
        if self.released {
            return Err(LoaderError::Open(format!("{} has been released", self.file_name)));
        }
        Ok(())
    }
}

impl BundleContext for FakeContext {
    fn source(&self) -> &Path {
        &self.source
    }

    fn plugin_providers(&mut self) -> Result<Vec<PluginProvider>> {
        self.ensure_open()?;
        if let Some(reason) = &self.bundle.plugin_lookup_error {
            return Err(LoaderError::ServiceConfiguration(reason.clone()));
        }

        Ok(self
            .bundle
            .candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| match candidate.clone() {
                Candidate::Plugin(plugin) => {
                    let plugin = plugin.attached_to(self.journal.clone());
                    PluginProvider::new(format!("fake::{}", plugin.id), move || {
                        Ok(PluginInstance::new(Box::new(plugin)))
                    })
                }
                Candidate::FailingConstructor(message) => {
                    PluginProvider::new(format!("fake::Broken{}", index), move || {
                        Err(PluginError::msg(message))
                    })
                }
                Candidate::PanickingConstructor(message) => {
                    PluginProvider::new(format!("fake::Panicking{}", index), move || {
                        panic!("{}", message)
                    })
                }
            })
            .collect())
    }

    fn aggregation_types(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        if let Some(reason) = &self.bundle.aggregation_lookup_error {
            return Err(LoaderError::ServiceConfiguration(reason.clone()));
        }
        Ok(self
            .bundle
            .aggregations
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn instantiate_aggregation(&mut self, type_name: &str) -> Result<LoadedAggregation> {
        self.ensure_open()?;
        let constructor = self
            .bundle
            .aggregations
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, constructor)| constructor.clone())
            .ok_or_else(|| LoaderError::instantiation(type_name, "not declared by the bundle"))?;

        self.journal.record(format!("aggregation:{}", type_name));
        match constructor {
            Constructor::Succeed => Ok(LoadedAggregation::new(
                type_name,
                Box::new(RecordingAggregation::new(type_name)),
            )),
            Constructor::Fail(message) => Err(LoaderError::instantiation(type_name, message)),
            Constructor::Panic(message) => panic!("{}", message),
        }
    }

    fn release(&mut self) -> Result<()> {
        *self
            .state
            .lock()
            .released
            .entry(self.file_name.clone())
            .or_default() += 1;
        if !self.released {
            self.released = true;
            self.journal.record(format!("release:{}", self.file_name));
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
