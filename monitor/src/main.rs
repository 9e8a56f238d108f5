//! Supply-chain monitor
//!
//! Replays a JSON scenario against a fresh registry, product ledger, pricing
//! engine and fraud detector, then prints the report as JSON on stdout.
//!
//! ```text
//! SUPPLY_CONFIG=monitor.toml supply-monitor scenario.json
//! ```

mod config;
mod runner;
mod scenario;

use anyhow::Context;
use config::MonitorConfig;
use runner::Monitor;
use scenario::Scenario;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: supply-monitor <scenario.json>")?;

    tracing::info!("Starting supply-chain monitor");

    let config = MonitorConfig::load()?;
    let scenario = Scenario::from_file(&path)?;
    let report = Monitor::new(config, &scenario)?.run(&scenario);

    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!(
        applied = report.applied,
        failed = report.failed,
        "Monitor finished"
    );
    Ok(())
}
