//! Command-line inspection of GC Desk plug-in directories.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gcdesk_core::plugins::{
    AggregationHost, LoadedAggregation, PluginManager, PluginRegistry, UnknownHostVersionPolicy,
};
use gcdesk_core::PluginConfig;

/// Environment variable enabling JSON log output.
const LOG_JSON_ENV: &str = "GCDESK_LOG_JSON";

/// GC Desk plug-in inspector - Scan a plug-in directory and report what the host would load.
#[derive(Parser, Debug)]
#[command(name = "gcdesk-plugins")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Plug-in directory (overrides config and GCDESK_PLUGIN_DIR).
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Running host version (overrides config and GCDESK_HOST_VERSION).
    #[arg(long, global = true)]
    host_version: Option<String>,

    /// Reject version-pinned plug-ins when the host version is unknown.
    #[arg(long, global = true)]
    strict_host_version: bool,

    /// Print the registry as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List every discovered plug-in with its status.
    List,
    /// Load plug-ins, register their aggregations and fail if any plug-in failed.
    Check,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var(LOG_JSON_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "gcdesk=debug" } else { "gcdesk=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(&args)?;
    tracing::debug!(?config, "Resolved plug-in configuration");

    let manager = PluginManager::new(config);
    let registry = manager.registry();

    let code = match args.command {
        Command::List => {
            if args.json {
                println!("{}", registry.to_json()?);
            } else {
                print_registry(&registry, &manager.config().directory);
            }
            ExitCode::SUCCESS
        }
        Command::Check => {
            let mut host = CountingHost::default();
            let accepted = manager.register_with(&mut host);

            if args.json {
                let report = serde_json::json!({
                    "registry": &*registry,
                    "registered_aggregations": host.counts,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_registry(&registry, &manager.config().directory);
                println!();
                println!("Registered {} aggregation(s)", accepted);
                for (type_name, count) in &host.counts {
                    println!("  {} x{}", type_name, count);
                }
            }

            if registry.failure_count() > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    };

    manager.close();
    Ok(code)
}

fn load_config(args: &Args) -> Result<PluginConfig> {
    let config = match &args.config {
        Some(path) => PluginConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PluginConfig::default(),
    };

    let mut config = config.with_env_overrides();
    if let Some(dir) = &args.dir {
        config.directory = dir.clone();
    }
    if let Some(version) = &args.host_version {
        config.host_version = Some(version.clone());
    }
    if args.strict_host_version {
        config.unknown_host_version = UnknownHostVersionPolicy::Reject;
    }
    Ok(config)
}

fn print_registry(registry: &PluginRegistry, dir: &std::path::Path) {
    if registry.is_empty() {
        println!("No plug-ins found in {}", dir.display());
    } else {
        println!("{:<13} {:<24} {:<10} SOURCE", "STATUS", "ID", "VERSION");
        for plugin in registry.plugins() {
            println!(
                "{:<13} {:<24} {:<10} {}",
                plugin.status(),
                plugin.id(),
                plugin.version(),
                plugin.source().display()
            );
            if !plugin.provided_aggregations().is_empty() {
                println!("    aggregations: {}", plugin.provided_aggregations().join(", "));
            }
            for warning in plugin.warnings() {
                println!("    warning: {}", warning);
            }
            for error in plugin.errors() {
                println!("    error: {}", error);
            }
        }
    }

    println!();
    println!(
        "{} plug-in(s): {} active, {} incompatible, {} failed (API {}, host {})",
        registry.len(),
        registry.active_count(),
        registry.incompatible_count(),
        registry.failure_count(),
        registry.api_version(),
        registry.host_version()
    );
}

/// Host that counts aggregations per type name.
#[derive(Default)]
struct CountingHost {
    counts: BTreeMap<String, usize>,
}

impl AggregationHost for CountingHost {
    fn load_aggregation(&mut self, aggregation: LoadedAggregation) -> gcdesk_core::plugins::Result<()> {
        *self.counts.entry(aggregation.type_name().to_string()).or_default() += 1;
        Ok(())
    }
}
