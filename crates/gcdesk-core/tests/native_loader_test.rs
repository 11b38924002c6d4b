//! Native Bundle Loader Tests
//!
//! Tests native loading error paths:
//! - Missing files and directories
//! - Invalid formats
//! - Libraries that fail to map

use std::path::PathBuf;

use gcdesk_core::plugins::{BundleLoader, BundleScanner, LoaderError, NativeBundleLoader, PluginManager, PluginStatus};
use gcdesk_core::PluginConfig;

fn native_name(stem: &str) -> String {
    format!("{}.{}", stem, std::env::consts::DLL_EXTENSION)
}

#[test]
fn test_bundle_extension_matches_platform() {
    let loader = NativeBundleLoader::new();
    assert!(matches!(loader.bundle_extension(), "so" | "dylib" | "dll"));
}

#[test]
fn test_load_nonexistent_file() {
    let loader = NativeBundleLoader::new();
    let path = PathBuf::from("/nonexistent/path/to").join(native_name("bundle"));

    match loader.open(&path) {
        Err(LoaderError::Open(reason)) => assert!(reason.contains("not a regular file")),
        Err(other) => panic!("expected Open error, got {}", other),
        Ok(_) => panic!("expected Open error, got a context"),
    }
}

#[test]
fn test_load_invalid_extension_format() {
    let dir = tempfile::tempdir().unwrap();
    let loader = NativeBundleLoader::new();

    for name in ["test.txt", "test.json", "test.jar", "test"] {
        let path = dir.path().join(name);
        std::fs::write(&path, b"payload").unwrap();
        assert!(
            matches!(loader.open(&path), Err(LoaderError::Open(_))),
            "expected error for {}",
            name
        );
    }
}

#[test]
fn test_scanner_ignores_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
    std::fs::write(dir.path().join("legacy.jar"), b"").unwrap();
    std::fs::write(dir.path().join(native_name("bundle")), b"").unwrap();

    let found: Vec<PathBuf> = BundleScanner::new(dir.path(), NativeBundleLoader::new().bundle_extension())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(found, vec![dir.path().join(native_name("bundle"))]);
}

#[test]
fn test_manager_reports_unmappable_bundles() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(native_name("first")), b"\x7fELF truncated").unwrap();
    std::fs::write(dir.path().join(native_name("second")), b"garbage").unwrap();
    std::fs::write(dir.path().join("ignored.txt"), b"garbage").unwrap();

    let manager = PluginManager::new(PluginConfig::with_directory(dir.path()));
    let registry = manager.registry();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.failure_count(), 2);
    for descriptor in registry.plugins() {
        assert_eq!(descriptor.status(), PluginStatus::Failed);
        assert!(descriptor.id().ends_with(std::env::consts::DLL_EXTENSION));
        assert!(descriptor.errors()[0].starts_with("Unable to create isolation context for plug-in: "));
    }
    manager.close();
}

#[test]
fn test_manager_with_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let manager = PluginManager::new(PluginConfig::with_directory(dir.path().join("plugins")));

    let registry = manager.registry();
    assert!(registry.is_empty());
    assert_eq!(registry.host_version(), "unknown");
}
