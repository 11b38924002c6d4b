//! Scripted plug-ins and aggregations.

use gcdesk_plugin_sdk::prelude::*;

use crate::journal::Journal;

/// Behaviour of a lifecycle hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Hook {
    #[default]
    Succeed,
    Fail(String),
    Panic(String),
}

impl Hook {
    fn run(&self) -> PluginResult<()> {
        match self {
            Hook::Succeed => Ok(()),
            Hook::Fail(message) => Err(PluginError::msg(message.clone())),
            Hook::Panic(message) => panic!("{}", message),
        }
    }
}

/// Plug-in whose metadata and hooks are set by the test.
///
/// Instances created by a fake loader record `<id>:initialize`,
/// `<id>:close` and `<id>:drop` in the loader's journal.
#[derive(Debug, Clone)]
pub struct ScriptedPlugin {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub target_api_version: String,
    pub required_host_version: String,
    pub on_initialize: Hook,
    pub on_close: Hook,
    journal: Option<Journal>,
}

impl ScriptedPlugin {
    /// A compatible plug-in: current API, any host version.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: "1.0.0".to_string(),
            description: String::new(),
            target_api_version: PLUGIN_API_VERSION.to_string(),
            required_host_version: "*".to_string(),
            on_initialize: Hook::Succeed,
            on_close: Hook::Succeed,
            journal: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn targeting_api(mut self, version: impl Into<String>) -> Self {
        self.target_api_version = version.into();
        self
    }

    pub fn requiring_host(mut self, version: impl Into<String>) -> Self {
        self.required_host_version = version.into();
        self
    }

    pub fn on_initialize(mut self, hook: Hook) -> Self {
        self.on_initialize = hook;
        self
    }

    pub fn on_close(mut self, hook: Hook) -> Self {
        self.on_close = hook;
        self
    }

    pub(crate) fn attached_to(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    fn record(&self, event: &str) {
        if let Some(journal) = &self.journal {
            journal.record(format!("{}:{}", self.id, event));
        }
    }
}

impl Plugin for ScriptedPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn target_api_version(&self) -> &str {
        &self.target_api_version
    }

    fn required_host_version(&self) -> &str {
        &self.required_host_version
    }

    fn initialize(&mut self) -> PluginResult<()> {
        self.record("initialize");
        self.on_initialize.run()
    }

    fn close(&mut self) -> PluginResult<()> {
        self.record("close");
        self.on_close.run()
    }
}

impl Drop for ScriptedPlugin {
    fn drop(&mut self) {
        self.record("drop");
    }
}

/// Aggregation that counts events and total pause time.
#[derive(Debug, Clone, Default)]
pub struct RecordingAggregation {
    label: String,
    events: u64,
    total_pause_ms: f64,
}

impl RecordingAggregation {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn events(&self) -> u64 {
        self.events
    }
}

impl Aggregation for RecordingAggregation {
    fn label(&self) -> &str {
        &self.label
    }

    fn accept(&mut self, event: &GcEvent) {
        self.events += 1;
        self.total_pause_ms += event.pause_ms;
    }

    fn summary(&self) -> Value {
        json!({
            "events": self.events,
            "total_pause_ms": self.total_pause_ms,
        })
    }
}

/// A short, deterministic sequence of collection events.
pub fn sample_events(count: usize) -> Vec<GcEvent> {
    const CAUSES: [&str; 3] = ["G1 Evacuation Pause", "Allocation Failure", "System.gc()"];
    (0..count)
        .map(|i| GcEvent {
            uptime_secs: 0.5 * (i as f64 + 1.0),
            cause: CAUSES[i % CAUSES.len()].to_string(),
            pause_ms: 1.0 + i as f64,
            heap_before_kb: 4096 + 128 * i as u64,
            heap_after_kb: 1024 + 64 * i as u64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_plugin_hooks() {
        let journal = Journal::new();
        let mut plugin = ScriptedPlugin::new("histogram")
            .on_close(Hook::Fail("disk full".to_string()))
            .attached_to(journal.clone());

        assert!(plugin.initialize().is_ok());
        assert_eq!(plugin.close().unwrap_err().to_string(), "disk full");
        drop(plugin);

        assert_eq!(
            journal.entries(),
            vec!["histogram:initialize", "histogram:close", "histogram:drop"]
        );
    }

    #[test]
    fn test_unattached_plugin_records_nothing() {
        let plugin = ScriptedPlugin::new("quiet");
        assert_eq!(plugin.target_api_version(), PLUGIN_API_VERSION);
        assert_eq!(plugin.required_host_version(), "*");
    }

    #[test]
    fn test_recording_aggregation_summary() {
        let mut aggregation = RecordingAggregation::new("pauses");
        for event in sample_events(3) {
            aggregation.accept(&event);
        }
        assert_eq!(aggregation.events(), 3);
        assert_eq!(
            aggregation.summary(),
            json!({ "events": 3, "total_pause_ms": 6.0 })
        );
    }
}
