//! Bundle used by the native loader tests.
//!
//! Every aggregation reports how many aggregations this copy of the library
//! has created, which tells apart two mappings of the same file.

use std::sync::atomic::{AtomicUsize, Ordering};

use gcdesk_plugin_sdk::declare_bundle;
use gcdesk_plugin_sdk::prelude::*;

static CREATED: AtomicUsize = AtomicUsize::new(0);

fn created() -> usize {
    CREATED.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Default)]
pub struct StatsPlugin;

impl Plugin for StatsPlugin {
    fn id(&self) -> &str {
        "test-stats"
    }

    fn name(&self) -> &str {
        "Test statistics"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn target_api_version(&self) -> &str {
        PLUGIN_API_VERSION
    }

    fn required_host_version(&self) -> &str {
        "*"
    }
}

pub struct EventCount {
    events: u64,
    created: usize,
}

impl Default for EventCount {
    fn default() -> Self {
        Self {
            events: 0,
            created: created(),
        }
    }
}

impl Aggregation for EventCount {
    fn label(&self) -> &str {
        "Events"
    }

    fn accept(&mut self, _event: &GcEvent) {
        self.events += 1;
    }

    fn summary(&self) -> Value {
        json!({ "events": self.events, "created_in_library": self.created })
    }
}

pub struct PauseTotal {
    pause_ms: f64,
    created: usize,
}

impl Default for PauseTotal {
    fn default() -> Self {
        Self {
            pause_ms: 0.0,
            created: created(),
        }
    }
}

impl Aggregation for PauseTotal {
    fn label(&self) -> &str {
        "Total pause"
    }

    fn accept(&mut self, event: &GcEvent) {
        self.pause_ms += event.pause_ms;
    }

    fn summary(&self) -> Value {
        json!({ "pause_ms": self.pause_ms, "created_in_library": self.created })
    }
}

declare_bundle! {
    plugins: [StatsPlugin],
    aggregations: [EventCount, PauseTotal],
}
