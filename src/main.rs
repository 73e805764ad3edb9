use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use omni_robotics::bus::Topic;
use omni_robotics::runner;
use omni_robotics::settings::{self, Mode, SimulationSettings};
use omni_robotics::simulation::TickSample;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Simulated time between telemetry log lines (s).
const TELEMETRY_PERIOD: f64 = 5.0;

/// Simulate a 3-wheel omnidirectional robot in free-run, pose regulation or
/// trajectory tracking mode.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML settings file, layered over config/default.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the control mode
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,
    /// Override the run duration (s)
    #[arg(short, long)]
    duration: Option<f64>,
    /// Write the run log to this CSV file
    #[arg(short, long)]
    export: Option<PathBuf>,
}

impl Args {
    /// Command-line values win over every configuration layer.
    fn apply(&self, settings: &mut SimulationSettings) {
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(duration) = self.duration {
            settings.duration = duration;
        }
        if let Some(export) = &self.export {
            settings.export = Some(export.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging (set RUST_LOG=debug for per-tick output)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = settings::load_settings(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut settings);
    settings.validate().context("invalid configuration")?;

    let topic: Topic<TickSample> = Topic::new(256);
    let telemetry = tokio::spawn(runner::log_telemetry(topic.subscribe(), TELEMETRY_PERIOD));

    let result = runner::run(&settings, &topic).await;
    drop(topic);
    let received = telemetry.await.context("telemetry task failed")?;

    let log = match result {
        Ok(log) => log,
        Err(e) => {
            error!("Simulation failed: {:?}", e);
            return Err(e);
        }
    };
    info!(ticks = received, "Telemetry closed");

    if let Some(path) = settings.export.as_deref() {
        log.export(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let args = Args::try_parse_from(["omni-robotics", "--mode", "free-run", "--duration", "3.5", "--export", "run.csv"])
            .unwrap();
        let mut settings = SimulationSettings::default();
        args.apply(&mut settings);
        assert_eq!(settings.mode, Mode::FreeRun);
        assert_eq!(settings.duration, 3.5);
        assert_eq!(settings.export, Some(PathBuf::from("run.csv")));
    }

    #[test]
    fn test_cli_without_flags_keeps_settings() {
        let args = Args::try_parse_from(["omni-robotics"]).unwrap();
        let mut settings = SimulationSettings {
            duration: 12.0,
            export: Some(PathBuf::from("keep.csv")),
            ..SimulationSettings::default()
        };
        args.apply(&mut settings);
        assert_eq!(settings.mode, Mode::Tracking);
        assert_eq!(settings.duration, 12.0);
        assert_eq!(settings.export, Some(PathBuf::from("keep.csv")));
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        assert!(Args::try_parse_from(["omni-robotics", "--mode", "hover"]).is_err());
    }
}
