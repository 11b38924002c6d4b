//! Sample GC Desk bundle.
//!
//! Build with `cargo build --release` from this directory and copy the
//! resulting library into the host's plug-in directory. The host and the
//! bundle must be built with the same compiler.

use std::collections::BTreeMap;

use gcdesk_plugin_sdk::prelude::*;
use gcdesk_plugin_sdk::declare_bundle;

/// Upper bounds (inclusive) of the pause histogram buckets, in milliseconds.
const PAUSE_BUCKETS_MS: [f64; 6] = [1.0, 5.0, 10.0, 50.0, 100.0, 500.0];

#[derive(Default)]
pub struct SamplePlugin;

impl Plugin for SamplePlugin {
    fn id(&self) -> &str {
        "gcdesk-sample"
    }

    fn name(&self) -> &str {
        "Sample aggregations"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Pause histogram and collection cause frequency"
    }

    fn target_api_version(&self) -> &str {
        PLUGIN_API_VERSION
    }

    fn required_host_version(&self) -> &str {
        "*"
    }
}

/// Counts pauses per duration bucket.
#[derive(Debug, Default)]
pub struct PauseHistogram {
    buckets: [u64; PAUSE_BUCKETS_MS.len() + 1],
    longest_ms: f64,
}

impl Aggregation for PauseHistogram {
    fn label(&self) -> &str {
        "Pause histogram"
    }

    fn accept(&mut self, event: &GcEvent) {
        let slot = PAUSE_BUCKETS_MS
            .iter()
            .position(|bound| event.pause_ms <= *bound)
            .unwrap_or(PAUSE_BUCKETS_MS.len());
        self.buckets[slot] += 1;
        self.longest_ms = self.longest_ms.max(event.pause_ms);
    }

    fn summary(&self) -> Value {
        let mut buckets = serde_json::Map::new();
        for (bound, count) in PAUSE_BUCKETS_MS.iter().zip(self.buckets.iter()) {
            buckets.insert(format!("<={}ms", bound), json!(count));
        }
        buckets.insert(
            format!(">{}ms", PAUSE_BUCKETS_MS[PAUSE_BUCKETS_MS.len() - 1]),
            json!(self.buckets[PAUSE_BUCKETS_MS.len()]),
        );
        json!({ "buckets": buckets, "longest_ms": self.longest_ms })
    }
}

/// Counts collections and reclaimed heap per cause.
#[derive(Debug, Default)]
pub struct CauseFrequency {
    causes: BTreeMap<String, (u64, u64)>,
}

impl Aggregation for CauseFrequency {
    fn label(&self) -> &str {
        "Collection causes"
    }

    fn accept(&mut self, event: &GcEvent) {
        let entry = self.causes.entry(event.cause.clone()).or_default();
        entry.0 += 1;
        entry.1 += event.reclaimed_kb();
    }

    fn summary(&self) -> Value {
        let causes: Vec<Value> = self
            .causes
            .iter()
            .map(|(cause, (count, reclaimed))| {
                json!({ "cause": cause, "count": count, "reclaimed_kb": reclaimed })
            })
            .collect();
        json!(causes)
    }
}

declare_bundle! {
    plugins: [SamplePlugin],
    aggregations: [PauseHistogram, CauseFrequency],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(cause: &str, pause_ms: f64) -> GcEvent {
        GcEvent {
            uptime_secs: 1.0,
            cause: cause.to_string(),
            pause_ms,
            heap_before_kb: 4096,
            heap_after_kb: 1024,
        }
    }

    #[test]
    fn test_pause_histogram_buckets() {
        let mut histogram = PauseHistogram::default();
        histogram.accept(&event("G1 Evacuation Pause", 0.5));
        histogram.accept(&event("G1 Evacuation Pause", 7.0));
        histogram.accept(&event("Full GC", 900.0));

        let summary = histogram.summary();
        assert_eq!(summary["buckets"]["<=1ms"], 1);
        assert_eq!(summary["buckets"]["<=10ms"], 1);
        assert_eq!(summary["buckets"][">500ms"], 1);
        assert_eq!(summary["longest_ms"], 900.0);
    }

    #[test]
    fn test_cause_frequency() {
        let mut causes = CauseFrequency::default();
        causes.accept(&event("Allocation Failure", 3.0));
        causes.accept(&event("Allocation Failure", 4.0));
        causes.accept(&event("System.gc()", 40.0));

        let summary = causes.summary();
        assert_eq!(summary[0]["cause"], "Allocation Failure");
        assert_eq!(summary[0]["count"], 2);
        assert_eq!(summary[0]["reclaimed_kb"], 6144);
        assert_eq!(summary[1]["count"], 1);
    }

    #[test]
    fn test_declaration_is_compatible() {
        assert!(gcdesk_bundle_declaration.check_compatible().is_ok());
    }
}
