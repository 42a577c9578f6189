//! sigwatch - signal consistency oracle
//!
//! Mirrors a producer's object tree from its change notifications and checks
//! the mirror against the producer's full-state query whenever the stream
//! goes quiet.
//!
//! Exit status: 0 clean, 1 infrastructure or usage failure, 5 divergence.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sigwatch_core::WatchConfig;
use sigwatch_model::{ObjectPath, PathError};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

mod commands;
mod logging;
mod producer;

/// sigwatch - verify that change notifications keep a mirror consistent
#[derive(Parser, Debug)]
#[command(name = "sigwatch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Service name of the producer (requires --root-path)
    #[arg(long, requires = "root_path", global = true)]
    service: Option<String>,

    /// Root object path of the producer (requires --service)
    #[arg(long, requires = "service", global = true, value_parser = parse_object_path)]
    root_path: Option<ObjectPath>,

    /// TOML file with an [engine] table
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine against an in-process simulated producer
    Simulate {
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Objects present before the first notification
        #[arg(long, default_value_t = 8)]
        objects: usize,

        /// Number of operations to simulate
        #[arg(long, default_value_t = 200)]
        operations: u64,

        /// Probability of dropping a notification
        #[arg(long, default_value_t = 0.0)]
        drop_rate: f64,

        /// Probability of corrupting a notified value
        #[arg(long, default_value_t = 0.0)]
        corrupt_rate: f64,

        /// Seconds to keep comparing after the simulation ends
        #[arg(long, default_value_t = 10)]
        settle_secs: u64,

        /// Kill this pid when divergence is confirmed
        #[arg(long, conflicts_with = "producer_name")]
        producer_pid: Option<i32>,

        /// Kill the first process whose command line contains this name
        #[arg(long)]
        producer_name: Option<String>,
    },

    /// Compare two JSON object trees offline
    Check {
        /// Authoritative tree (the snapshot side)
        snapshot: PathBuf,

        /// Mirror tree (the shadow side)
        shadow: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Simulate {
            seed,
            objects,
            operations,
            drop_rate,
            corrupt_rate,
            settle_secs,
            producer_pid,
            producer_name,
        } => {
            let options = commands::SimulateOptions {
                seed,
                objects,
                operations,
                drop_rate,
                corrupt_rate,
                settle: Duration::from_secs(settle_secs),
                producer_pid,
                producer_name,
            };
            commands::simulate(config, options).await
        }
        Commands::Check {
            snapshot,
            shadow,
            json,
        } => commands::check(&snapshot, &shadow, json),
    }
}

/// Validated absolute object path
fn parse_object_path(s: &str) -> Result<ObjectPath, PathError> {
    s.parse()
}

/// File values first, then the command line target override
fn load_config(cli: &Cli) -> Result<WatchConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            WatchConfig::from_toml_str(&text)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => WatchConfig::default(),
    };

    match (&cli.service, &cli.root_path) {
        (Some(service), Some(root)) => config = config.with_target(service.clone(), root.clone()),
        (None, None) => {}
        _ => bail!("--service and --root-path must be given together"),
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sigwatch").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_target_lvmdbusd() {
        let cli = parse(&["check", "a.json", "b.json"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.service, sigwatch_core::DEFAULT_SERVICE);
        assert_eq!(config.root_path.as_str(), sigwatch_core::DEFAULT_ROOT_PATH);
    }

    #[test]
    fn target_override_requires_both_flags() {
        assert!(parse(&["--service", "com.example.Storage", "check", "a", "b"]).is_err());
        assert!(parse(&["--root-path", "/com/example/Storage", "check", "a", "b"]).is_err());

        let cli = parse(&[
            "--service",
            "com.example.Storage",
            "--root-path",
            "/com/example/Storage",
            "check",
            "a",
            "b",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.service, "com.example.Storage");
        assert_eq!(config.root_path.as_str(), "/com/example/Storage");
    }

    #[test]
    fn relative_root_path_is_rejected() {
        let err = parse(&["--service", "s", "--root-path", "relative", "check", "a", "b"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(parse(&["--service", "s", "--root-path", "/o//1", "check", "a", "b"]).is_err());
    }

    #[test]
    fn config_file_sets_timings_and_flags_override_target() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[engine]\nservice = \"com.example.A\"\nroot_path = \"/a\"\nquiescence_window_ms = 1500"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = parse(&["--config", path, "--service", "com.example.B", "--root-path", "/b", "check", "x", "y"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.quiescence_window(), Duration::from_millis(1500));
        assert_eq!(config.service, "com.example.B");
        assert_eq!(config.root_path.as_str(), "/b");
    }

    #[test]
    fn producer_selectors_conflict() {
        assert!(parse(&["simulate", "--producer-pid", "10", "--producer-name", "x"]).is_err());
        let cli = parse(&["simulate", "--drop-rate", "0.1"]).unwrap();
        assert!(matches!(cli.command, Commands::Simulate { drop_rate, .. } if (drop_rate - 0.1).abs() < f64::EPSILON));
    }
}
