//! Native Bundle Integration Tests
//!
//! Loads a real bundle built from `tests/test-bundles/stats_bundle`:
//! - Declaration reading and service discovery through libloading
//! - Two copies of one library stay isolated from each other
//! - Aggregations keep their library mapped after the manager closes

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX, DLL_SUFFIX};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use gcdesk_core::plugins::{BundleLoader, LoaderError, NativeBundleLoader, PluginManager, PluginStatus};
use gcdesk_core::PluginConfig;
use gcdesk_testing::{sample_events, RecordingHost};
use tempfile::TempDir;

/// Build the test bundle once per test binary and return the library path.
fn test_bundle() -> &'static Path {
    static BUNDLE: OnceLock<PathBuf> = OnceLock::new();
    BUNDLE.get_or_init(|| {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../Cargo.toml");
        let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("test-bundles");

        let status = Command::new(env!("CARGO"))
            .arg("build")
            .arg("--quiet")
            .arg("--manifest-path")
            .arg(&manifest)
            .args(["--package", "gcdesk-test-bundle"])
            .arg("--target-dir")
            .arg(&target_dir)
            .status()
            .expect("failed to run cargo");
        assert!(status.success(), "building gcdesk-test-bundle failed");

        let path = target_dir
            .join("debug")
            .join(format!("{}gcdesk_test_bundle{}", DLL_PREFIX, DLL_SUFFIX));
        assert!(path.is_file(), "missing {}", path.display());
        path
    })
}

/// Copy the test bundle into a fresh plug-in directory under each stem.
fn plugin_dir(stems: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for stem in stems {
        let target = dir.path().join(format!("{}.{}", stem, DLL_EXTENSION));
        std::fs::copy(test_bundle(), target).unwrap();
    }
    dir
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("gcdesk=debug")
        .try_init();
}

#[test]
fn test_context_discovers_declared_services() {
    init_tracing();
    let dir = plugin_dir(&["stats"]);
    let path = dir.path().join(format!("stats.{}", DLL_EXTENSION));

    let mut context = NativeBundleLoader::new().open(&path).unwrap();
    assert_eq!(context.source(), path);

    let providers = context.plugin_providers().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].type_name(), "gcdesk_test_bundle::StatsPlugin");

    assert_eq!(
        context.aggregation_types().unwrap(),
        vec!["gcdesk_test_bundle::EventCount", "gcdesk_test_bundle::PauseTotal"]
    );

    let plugin = providers.into_iter().next().unwrap().get().unwrap();
    assert_eq!(plugin.id(), "test-stats");
    assert_eq!(plugin.target_api_version(), "1.0");

    let aggregation = context
        .instantiate_aggregation("gcdesk_test_bundle::PauseTotal")
        .unwrap();
    assert_eq!(aggregation.type_name(), "gcdesk_test_bundle::PauseTotal");
    assert_eq!(aggregation.label(), "Total pause");

    match context.instantiate_aggregation("gcdesk_test_bundle::Missing") {
        Err(LoaderError::Instantiation { type_name, .. }) => {
            assert_eq!(type_name, "gcdesk_test_bundle::Missing")
        }
        Err(other) => panic!("expected Instantiation error, got {}", other),
        Ok(_) => panic!("undeclared aggregation was instantiated"),
    }

    // Instances still hold the library, so release only drops the context's
    // handle; a second release is a no-op.
    context.release().unwrap();
    context.release().unwrap();
    assert!(context.plugin_providers().is_err());

    drop(plugin);
    drop(aggregation);
}

#[test]
fn test_copies_of_one_bundle_do_not_collide() {
    init_tracing();
    let dir = plugin_dir(&["alpha", "beta"]);
    let manager = PluginManager::new(PluginConfig::with_directory(dir.path()));

    let registry = manager.registry();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.active_count(), 2);

    let sources: Vec<PathBuf> = registry.plugins().iter().map(|d| d.source().to_path_buf()).collect();
    assert_eq!(
        sources,
        vec![
            dir.path().join(format!("alpha.{}", DLL_EXTENSION)),
            dir.path().join(format!("beta.{}", DLL_EXTENSION)),
        ]
    );
    for descriptor in registry.plugins() {
        assert_eq!(descriptor.status(), PluginStatus::Loaded);
        assert_eq!(descriptor.id(), "test-stats");
        assert_eq!(
            descriptor.provided_aggregations(),
            ["gcdesk_test_bundle::EventCount", "gcdesk_test_bundle::PauseTotal"]
        );
        assert!(descriptor.errors().is_empty());
    }

    let mut host = RecordingHost::new();
    assert_eq!(manager.register_with(&mut host), 4);
    assert_eq!(
        host.type_names(),
        vec![
            "gcdesk_test_bundle::EventCount",
            "gcdesk_test_bundle::PauseTotal",
            "gcdesk_test_bundle::EventCount",
            "gcdesk_test_bundle::PauseTotal",
        ]
    );

    // Each mapping has its own statics: both copies count from one.
    let created: Vec<u64> = host
        .loaded()
        .iter()
        .map(|a| a.summary()["created_in_library"].as_u64().unwrap())
        .collect();
    assert_eq!(created, vec![1, 2, 1, 2]);

    manager.close();
    manager.close();
}

#[test]
fn test_aggregations_outlive_manager() {
    init_tracing();
    let dir = plugin_dir(&["stats"]);
    let manager = PluginManager::new(PluginConfig::with_directory(dir.path()));

    let mut host = RecordingHost::new();
    assert_eq!(manager.register_with(&mut host), 2);
    manager.close();
    drop(manager);

    host.feed(&sample_events(3));
    assert_eq!(host.loaded()[0].summary()["events"], 3);
    assert_eq!(host.loaded()[1].summary()["pause_ms"], 6.0);

    // Dropping the last aggregation unmaps the library.
    drop(host);
}

#[test]
fn test_declaration_read_is_logged_with_sdk_version() {
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let dir = plugin_dir(&["stats"]);
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter("gcdesk_core=debug")
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let manager = PluginManager::new(PluginConfig::with_directory(dir.path()));
        assert_eq!(manager.registry().active_count(), 1);
    });

    let output = String::from_utf8(logs.0.lock().clone()).unwrap();
    let line = output
        .lines()
        .find(|line| line.contains("Read bundle declaration"))
        .expect("declaration read was not logged");
    assert!(line.contains("sdk_version"));
    assert!(line.contains(gcdesk_plugin_sdk::SDK_VERSION));
}
