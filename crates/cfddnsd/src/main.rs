// # cfddnsd - Cloudflare DDNS Daemon
//
// Thin integration layer: reads environment configuration, installs logging,
// wires the interface address source, Cloudflare provider and file state
// store into a `DdnsEngine`, and runs it until SIGINT/SIGTERM.
//
// All DDNS logic lives in cfddns-core.
//
// ## Configuration
//
// Variables are read from the environment. A `.env` file in the working
// directory (or any parent) is loaded first; variables already set win.
//
// - `LOG_LEVEL`: trace, debug, info, warn/warning, error/critical/fatal (default info)
// - `ZONE_ID`: Cloudflare zone holding the records (required)
// - `AUTHORIZATION_KEY`: Cloudflare API token (required)
// - `NETWORK_INTERFACE`: Interface whose addresses are published (required)
// - `DOMAIN_NAMES`: Comma-separated record names (required)
// - `IPV4_DDNS` / `IPV6_DDNS`: `1` enables A / AAAA records
// - `UPDATE_INTERVAL_SECONDS`: Seconds between cycles (default 120)
// - `STATE_FILE`: Sync state path (default `<tmp>/cloudflare-ddns/status.dat`)
// - `DDNS_MODE`: `dry-run` logs writes instead of sending them
//
// ## Example
//
// ```bash
// export ZONE_ID=023e105f4ecef8ad9ca31a8372d0c353
// export AUTHORIZATION_KEY=your_token
// export NETWORK_INTERFACE=eth0
// export DOMAIN_NAMES=home.example.com,nas.example.com
// export IPV4_DDNS=1
// export IPV6_DDNS=1
//
// cfddnsd
// ```

use anyhow::{Context, Result, bail};
use cfddns_core::{
    DdnsConfig, DdnsEngine, EngineEvent, ErrorKind, FileStateStore, config::DEFAULT_UPDATE_INTERVAL_SECS,
};
use cfddns_ip_iface::InterfaceAddressSource;
use cfddns_provider_cloudflare::CloudflareProvider;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Result of looking for a `.env` file
#[derive(Debug)]
enum EnvFile {
    Loaded(PathBuf),
    Missing,
    Invalid(dotenvy::Error),
}

/// Load `path`, or the nearest `.env` when `None`, into the process environment
///
/// Variables that are already set are not overridden.
fn load_env_file(path: Option<&Path>) -> EnvFile {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => EnvFile::Loaded(path),
        Err(e) if e.not_found() => EnvFile::Missing,
        Err(e) => EnvFile::Invalid(e),
    }
}

/// Parse `LOG_LEVEL`, accepting the common aliases
fn parse_log_level(raw: Option<&str>) -> Result<Level> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(Level::INFO);
    }

    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "critical" | "fatal" => Ok(Level::ERROR),
        _ => bail!(
            "LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

/// Read a required variable, trimmed and non-empty
fn required<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).map(|v| v.trim().to_string()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("{} is required. Set it via: export {}=...", name, name),
    }
}

/// Parse `UPDATE_INTERVAL_SECONDS`, falling back to the default on bad input
fn parse_interval(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_UPDATE_INTERVAL_SECS;
    };

    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => {
            warn!(
                "UPDATE_INTERVAL_SECONDS '{}' is not a positive integer, using {}s",
                raw, DEFAULT_UPDATE_INTERVAL_SECS
            );
            DEFAULT_UPDATE_INTERVAL_SECS
        }
    }
}

/// Build the agent configuration from an environment lookup
fn load_config<F>(lookup: F) -> Result<DdnsConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let zone_id = required(&lookup, "ZONE_ID")?;
    let authorization_key = required(&lookup, "AUTHORIZATION_KEY")?;
    let network_interface = required(&lookup, "NETWORK_INTERFACE")?;
    let domain_names = required(&lookup, "DOMAIN_NAMES")?;

    let flag = |name: &str| lookup(name).is_some_and(|v| v == "1");

    let mut builder = DdnsConfig::builder()
        .zone_id(zone_id)
        .authorization_key(authorization_key)
        .network_interface(network_interface)
        .domain_names(domain_names.split(','))
        .ipv4_ddns(flag("IPV4_DDNS"))
        .ipv6_ddns(flag("IPV6_DDNS"))
        .update_interval_secs(parse_interval(lookup("UPDATE_INTERVAL_SECONDS").as_deref()))
        .dry_run(
            lookup("DDNS_MODE").is_some_and(|m| m.trim().eq_ignore_ascii_case("dry-run")),
        );

    if let Some(path) = lookup("STATE_FILE").filter(|p| !p.trim().is_empty()) {
        builder = builder.state_file(path.trim());
    }

    builder.build().context("Invalid configuration")
}

fn main() -> ExitCode {
    // Before anything reads the environment, LOG_LEVEL included
    let env_file = load_env_file(None);
    let lookup = |name: &str| env::var(name).ok();

    // Logging comes first so configuration errors are reported through it
    let level = parse_log_level(lookup("LOG_LEVEL").as_deref());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(*level.as_ref().unwrap_or(&Level::INFO))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    match env_file {
        EnvFile::Loaded(path) => info!("Loaded environment from {}", path.display()),
        EnvFile::Missing => debug!("No .env file found, using the process environment"),
        EnvFile::Invalid(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    if let Err(e) = level {
        error!("Configuration error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config = match load_config(lookup) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!("Starting cfddnsd daemon");
    info!(
        "Interface [{}], {} domain(s), IPv4 {}, IPv6 {}, every {}s, state file {}",
        config.network_interface,
        config.domain_names.len(),
        on_off(config.ipv4_ddns),
        on_off(config.ipv6_ddns),
        config.update_interval_secs,
        config.state_file.display()
    );
    if !config.ipv4_ddns && !config.ipv6_ddns {
        warn!("Both IPV4_DDNS and IPV6_DDNS are off; no records will be written");
    }

    // Cycles are sequential, one thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Wire the components and run the engine until a shutdown signal
async fn run_daemon(config: DdnsConfig) -> DdnsExitCode {
    let (engine, events) = match build_engine(config) {
        Ok(parts) => parts,
        Err(e) if e.kind() == ErrorKind::Config => {
            error!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError;
        }
        Err(e) => {
            error!("Failed to start engine: {}", e);
            return DdnsExitCode::RuntimeError;
        }
    };

    tokio::spawn(log_events(events));

    match engine.run().await {
        Ok(()) => {
            info!("Shutting down daemon");
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

fn build_engine(
    config: DdnsConfig,
) -> cfddns_core::Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let address_source = InterfaceAddressSource::new(config.network_interface.clone());
    let provider = CloudflareProvider::new(
        config.zone_id.clone(),
        config.authorization_key.clone(),
        config.dry_run,
    )?;
    let state_store = FileStateStore::new(&config.state_file);

    DdnsEngine::new(
        Box::new(address_source),
        Box::new(provider),
        Box::new(state_store),
        config,
    )
}

/// Drain engine events so the channel never fills
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::CycleCompleted {
                cycle,
                failures,
                state_saved,
            } if failures > 0 || !state_saved => {
                warn!(
                    "Cycle {} finished with {} failed domain(s), state saved: {}",
                    cycle, failures, state_saved
                );
            }
            other => debug!("Engine event: {:?}", other),
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
