//! Subcommand implementations
//!
//! Each returns the process exit status on success; errors bubble up to
//! `main` and exit with status 1.

use crate::producer::{PidHandle, ProcessNameHandle};
use anyhow::{Context, Result};
use sigwatch_core::{
    compare, notification_channel, Engine, NoProducer, ProducerHandle, Simulator, SimulatorConfig,
    WatchConfig,
};
use sigwatch_model::{DivergenceReport, ObjectTree, ShadowStore, Snapshot};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Exit status when the trees differ
const EXIT_DIVERGED: i32 = 5;

/// Options for `sigwatch simulate`
#[derive(Debug, Clone)]
pub(crate) struct SimulateOptions {
    pub(crate) seed: u64,
    pub(crate) objects: usize,
    pub(crate) operations: u64,
    pub(crate) drop_rate: f64,
    pub(crate) corrupt_rate: f64,
    pub(crate) settle: Duration,
    pub(crate) producer_pid: Option<i32>,
    pub(crate) producer_name: Option<String>,
}

impl SimulateOptions {
    fn producer(&self) -> Box<dyn ProducerHandle> {
        match (self.producer_pid, &self.producer_name) {
            (Some(pid), _) => Box::new(PidHandle::new(pid)),
            (None, Some(name)) => Box::new(ProcessNameHandle::new(name.clone())),
            (None, None) => Box::new(NoProducer),
        }
    }
}

/// Run the engine against the in-process simulator
///
/// Stops on SIGINT/SIGTERM, on escalation, or once the simulation has
/// finished and `settle` has elapsed.
pub(crate) async fn simulate(config: WatchConfig, options: SimulateOptions) -> Result<i32> {
    let sim = Simulator::new(SimulatorConfig {
        seed: options.seed,
        objects: options.objects,
        operations: options.operations,
        drop_rate: options.drop_rate,
        corrupt_rate: options.corrupt_rate,
        root: config.root_path.clone(),
        ..SimulatorConfig::default()
    })
    .context("invalid simulator options")?;

    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;

    let (sender, notifications) = notification_channel();
    let mut engine = Engine::new(config, Arc::new(sim.service()), options.producer());
    let simulation = tokio::spawn(sim.run(sender));

    let settle = options.settle;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = async {
                if let Ok(report) = simulation.await {
                    info!(?report, "Simulation done, waiting for final comparison");
                }
                tokio::time::sleep(settle).await;
            } => {}
        }
    };

    let outcome = engine
        .run(notifications, shutdown)
        .await
        .context("engine failed")?;
    info!(?outcome, passes = engine.passes(), "Finished");
    Ok(outcome.exit_code())
}

/// Diff two JSON object trees offline
///
/// Prints the findings (or a JSON report with `json`) and returns 5 when
/// the trees differ.
pub(crate) fn check(snapshot_file: &Path, shadow_file: &Path, json: bool) -> Result<i32> {
    let snapshot = Snapshot::new(read_tree(snapshot_file)?);
    let shadow = ShadowStore::from_tree(read_tree(shadow_file)?);

    let report = compare(&snapshot, &shadow);
    println!("{}", render_report(&report, json)?);

    Ok(if report.is_empty() { 0 } else { EXIT_DIVERGED })
}

fn render_report(report: &DivergenceReport, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(report).context("failed to serialize report");
    }
    if report.is_empty() {
        return Ok("No differences found".to_string());
    }

    let mut lines: Vec<String> = report.iter().map(ToString::to_string).collect();
    let summary = report
        .count_by_kind()
        .into_iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(format!("{} differences ({summary})", report.len()));
    Ok(lines.join("\n"))
}

fn read_tree(path: &Path) -> Result<ObjectTree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
