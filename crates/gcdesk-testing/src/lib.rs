//! Testing utilities for the GC Desk plug-in host
//!
//! This crate provides:
//! - An in-memory bundle loader with scripted bundles
//! - Scripted plug-ins and aggregations that record their lifecycle
//! - A recording aggregation host
//! - Sample collection events

pub mod fake_loader;
pub mod host;
pub mod journal;
pub mod scripted;

pub use fake_loader::{FakeBundle, FakeBundleLoader, FAKE_BUNDLE_EXTENSION};
pub use host::RecordingHost;
pub use journal::Journal;
pub use scripted::{sample_events, Hook, RecordingAggregation, ScriptedPlugin};
