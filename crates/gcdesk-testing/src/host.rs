//! Aggregation host that keeps everything it is given.

use std::collections::HashSet;

use gcdesk_core::plugins::{AggregationHost, LoadedAggregation, LoaderError, Result};
use gcdesk_plugin_sdk::GcEvent;

/// Records every aggregation handed over by the manager.
#[derive(Debug, Default)]
pub struct RecordingHost {
    loaded: Vec<LoadedAggregation>,
    rejected_types: HashSet<String>,
    attempts: usize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse aggregations declared under `type_name`.
    pub fn rejecting(mut self, type_name: impl Into<String>) -> Self {
        self.rejected_types.insert(type_name.into());
        self
    }

    /// Accepted aggregations, in registration order.
    pub fn loaded(&self) -> &[LoadedAggregation] {
        &self.loaded
    }

    /// Type names of the accepted aggregations.
    pub fn type_names(&self) -> Vec<&str> {
        self.loaded.iter().map(|a| a.type_name()).collect()
    }

    /// Every call to `load_aggregation`, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Feed events to every accepted aggregation.
    pub fn feed(&mut self, events: &[GcEvent]) {
        for aggregation in &mut self.loaded {
            for event in events {
                aggregation.accept(event);
            }
        }
    }
}

impl AggregationHost for RecordingHost {
    fn load_aggregation(&mut self, aggregation: LoadedAggregation) -> Result<()> {
        self.attempts += 1;
        if self.rejected_types.contains(aggregation.type_name()) {
            return Err(LoaderError::Registration(format!(
                "{} is disabled",
                aggregation.type_name()
            )));
        }
        self.loaded.push(aggregation);
        Ok(())
    }
}
