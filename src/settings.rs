use std::path::{Path, PathBuf};

use ::config::{Config, ConfigError, Environment, File, FileFormat, Map};
use anyhow::ensure;
use omni_control::{ControlGain, MAX_GAIN, TrajectoryShape};
use omni_kinematics::{BodyVelocity, Pose};
use serde::Deserialize;
use tracing::{error, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix for environment overrides, e.g. `OMNI_KP=0.8` or `OMNI_TRACKING__PERIOD=20`.
pub const ENV_PREFIX: &str = "OMNI";

/// Which controller drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Constant body velocity, no feedback.
    FreeRun,
    /// Drive to a fixed goal pose.
    Regulation,
    /// Follow a reference trajectory.
    #[default]
    Tracking,
}

/// A pose as a user enters it: heading in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PoseSetting {
    pub x: f64,
    pub y: f64,
    pub heading_deg: f64,
}

impl PoseSetting {
    pub fn to_pose(self) -> Pose {
        Pose::from_degrees(self.x, self.y, self.heading_deg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FreeRunSettings {
    pub vx: f64,
    pub vy: f64,
    pub w: f64,
}

impl FreeRunSettings {
    pub fn velocity(&self) -> BodyVelocity {
        BodyVelocity::new(self.vx, self.vy, self.w)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RegulationSettings {
    pub goal: PoseSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SaturationSettings {
    pub vx_max: f64,
    pub vy_max: f64,
    pub w_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub shape: TrajectoryShape,
    pub period: f64,
    pub saturation: Option<SaturationSettings>,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        TrackingSettings {
            shape: TrajectoryShape::Lemniscate,
            period: 40.0,
            saturation: None,
        }
    }
}

/// Everything needed to set up one simulation run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub mode: Mode,
    /// Integration step (s).
    pub dt: f64,
    /// RK4 substeps per `dt`.
    pub substeps: u32,
    /// Simulated run length (s).
    pub duration: f64,
    /// Wall-clock pacing of the loop; `0` runs as fast as possible.
    pub tick_rate_hz: f64,
    pub kp: f64,
    pub initial_pose: PoseSetting,
    pub free_run: FreeRunSettings,
    pub regulation: RegulationSettings,
    pub tracking: TrackingSettings,
    /// CSV file written when the run ends.
    pub export: Option<PathBuf>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            mode: Mode::default(),
            dt: 0.1,
            substeps: omni_kinematics::integrator::DEFAULT_SUBSTEPS,
            duration: 40.0,
            tick_rate_hz: 0.0,
            kp: 0.4,
            initial_pose: PoseSetting {
                x: 2.0,
                y: 2.0,
                heading_deg: 0.0,
            },
            free_run: FreeRunSettings::default(),
            regulation: RegulationSettings::default(),
            tracking: TrackingSettings::default(),
            export: None,
        }
    }
}

impl SimulationSettings {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.dt.is_finite() && self.dt > 0.0, "dt must be positive, got {}", self.dt);
        ensure!(self.substeps > 0, "substeps must be at least 1");
        ensure!(
            self.duration.is_finite() && self.duration > 0.0,
            "duration must be positive, got {}",
            self.duration
        );
        ensure!(
            self.tick_rate_hz.is_finite() && self.tick_rate_hz >= 0.0,
            "tick_rate_hz must be zero or positive, got {}",
            self.tick_rate_hz
        );
        ensure!(self.kp.is_finite() && self.kp >= 0.0, "kp must be non-negative, got {}", self.kp);
        ensure!(self.initial_pose.to_pose().is_finite(), "initial pose must be finite");

        match self.mode {
            Mode::FreeRun => {
                let v = self.free_run.velocity();
                ensure!(
                    v.vx.is_finite() && v.vy.is_finite() && v.w.is_finite(),
                    "free-run velocity must be finite"
                );
            }
            Mode::Regulation => {
                ensure!(self.regulation.goal.to_pose().is_finite(), "goal pose must be finite");
            }
            Mode::Tracking => {
                let period = self.tracking.period;
                ensure!(period.is_finite() && period > 0.0, "tracking period must be positive, got {}", period);
                if let Some(limits) = self.tracking.saturation {
                    ensure!(
                        limits.vx_max > 0.0 && limits.vy_max > 0.0 && limits.w_max > 0.0,
                        "saturation limits must be positive"
                    );
                }
            }
        }
        Ok(())
    }

    /// The gain actually used, capped at [`MAX_GAIN`].
    pub fn gain(&self) -> ControlGain {
        if self.kp > MAX_GAIN {
            warn!(kp = self.kp, max = MAX_GAIN, "Gain above maximum, clamping.");
        }
        ControlGain::clamped(self.kp)
    }
}

/// Load settings from `config/default.toml` (if present), then `path` (if
/// given, must exist), then `OMNI_*` environment variables. Anything not set
/// falls back to [`SimulationSettings::default`].
pub fn load_settings(path: Option<&Path>) -> Result<SimulationSettings, ConfigError> {
    load_settings_with_env(path, None)
}

/// Same as [`load_settings`], reading the `OMNI_*` overrides from `env`
/// instead of the process environment when it is given.
pub fn load_settings_with_env(
    path: Option<&Path>,
    env: Option<Map<String, String>>,
) -> Result<SimulationSettings, ConfigError> {
    info!(default = DEFAULT_CONFIG_PATH, override_path = ?path, "Attempting to load configuration");

    let mut builder = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false));
    if let Some(path) = path {
        builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(true));
    }
    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .and_then(|config| config.try_deserialize::<SimulationSettings>());

    match settings {
        Ok(settings) => {
            info!(mode = ?settings.mode, dt = settings.dt, duration = settings.duration, "Successfully loaded configuration");
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = SimulationSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.mode, Mode::Tracking);
        assert_eq!(settings.initial_pose.to_pose(), Pose::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let cases: [fn(&mut SimulationSettings); 9] = [
            |s| s.dt = 0.0,
            |s| s.dt = f64::NAN,
            |s| s.substeps = 0,
            |s| s.duration = -1.0,
            |s| s.tick_rate_hz = -5.0,
            |s| s.kp = -0.1,
            |s| s.initial_pose.x = f64::INFINITY,
            |s| s.tracking.period = 0.0,
            |s| {
                s.tracking.saturation = Some(SaturationSettings {
                    vx_max: 1.0,
                    vy_max: 0.0,
                    w_max: 1.0,
                })
            },
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut settings = SimulationSettings::default();
            mutate(&mut settings);
            assert!(settings.validate().is_err(), "case {} should be rejected", i);
        }
    }

    #[test]
    fn test_tracking_checks_skipped_in_other_modes() {
        let mut settings = SimulationSettings::default();
        settings.mode = Mode::Regulation;
        settings.tracking.period = 0.0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_gain_is_clamped() {
        let mut settings = SimulationSettings::default();
        settings.kp = 1.7;
        assert!(settings.validate().is_ok());
        assert_eq!(settings.gain().kp(), 1.0);
        settings.kp = 0.25;
        assert_eq!(settings.gain().kp(), 0.25);
    }

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_env_overrides_file_values() {
        let settings = load_settings_with_env(
            None,
            env(&[
                ("OMNI_MODE", "regulation"),
                ("OMNI_KP", "0.8"),
                ("OMNI_TRACKING__PERIOD", "20"),
                ("OMNI_REGULATION__GOAL__X", "-3.5"),
                ("UNRELATED_KP", "0.1"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.mode, Mode::Regulation);
        assert_eq!(settings.kp, 0.8);
        assert_eq!(settings.tracking.period, 20.0);
        assert_eq!(settings.regulation.goal.x, -3.5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_rejects_non_numeric_value() {
        assert!(load_settings_with_env(None, env(&[("OMNI_DT", "fast")])).is_err());
    }

    #[test]
    fn test_saturation_limits_checked_on_load() {
        let parsed = Config::builder()
            .add_source(File::from_str("vx_max = -1.0\nvy_max = 1.0\nw_max = 1.0", FileFormat::Toml))
            .build()
            .and_then(|config| config.try_deserialize::<omni_control::SaturationLimits>());
        assert!(parsed.is_err());
    }

    #[test]
    fn test_pose_setting_converts_degrees() {
        let pose = PoseSetting {
            x: 1.0,
            y: 2.0,
            heading_deg: 180.0,
        }
        .to_pose();
        assert!((pose.theta - std::f64::consts::PI).abs() < 1e-12);
    }
}
