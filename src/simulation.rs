//! The per-tick driver: one controller, one [`MotionState`], one run log.
//!
//! ```text
//! Idle ──configure──▶ Configured ──start──▶ Running ──stop / duration──▶ Stopped
//!                         ▲                                                 │
//!                         └───────────────────── restart ───────────────────┘
//! ```

use anyhow::{Context, bail, ensure};
use omni_control::regulation::PoseRegulator;
use omni_control::{PoseError, SaturationLimits, TrackingController, Trajectory};
use omni_kinematics::{BodyVelocity, MotionState, Pose};
use tracing::{debug, info};

use crate::settings::{Mode, SimulationSettings};
use crate::telemetry::{RunLog, SettleFilter};

/// How each tick's velocity command is produced.
#[derive(Debug, Clone, Copy)]
pub enum Controller {
    FreeRun(BodyVelocity),
    Regulation(PoseRegulator),
    Tracking {
        trajectory: Trajectory,
        controller: TrackingController,
    },
}

/// Static configuration of a run. Kept across restarts.
#[derive(Debug, Clone, Copy)]
pub struct RunSetup {
    pub initial_pose: Pose,
    pub dt: f64,
    pub substeps: u32,
    pub duration: f64,
    pub controller: Controller,
}

impl RunSetup {
    pub fn from_settings(settings: &SimulationSettings) -> anyhow::Result<Self> {
        let controller = match settings.mode {
            Mode::FreeRun => Controller::FreeRun(settings.free_run.velocity()),
            Mode::Regulation => {
                Controller::Regulation(PoseRegulator::new(settings.regulation.goal.to_pose(), settings.gain()))
            }
            Mode::Tracking => {
                let trajectory = Trajectory::configure(settings.tracking.shape, settings.tracking.period)
                    .context("invalid tracking trajectory")?;
                let mut controller = TrackingController::new(settings.gain());
                if let Some(limits) = settings.tracking.saturation {
                    let limits = SaturationLimits::new(limits.vx_max, limits.vy_max, limits.w_max)
                        .context("invalid saturation limits")?;
                    controller = controller.with_saturation(limits);
                }
                Controller::Tracking { trajectory, controller }
            }
        };
        Ok(RunSetup {
            initial_pose: settings.initial_pose.to_pose(),
            dt: settings.dt,
            substeps: settings.substeps,
            duration: settings.duration,
            controller,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Configured,
    Running,
    Stopped,
}

/// What the driver reports after each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSample {
    /// Elapsed time after the step (s).
    pub t: f64,
    /// Pose after the step.
    pub pose: Pose,
    /// Command applied during the step.
    pub velocity: BodyVelocity,
    /// Goal or reference (as used for the command) minus the new pose.
    /// Zero in free-run.
    pub error: PoseError,
}

#[derive(Debug)]
pub struct Simulation {
    phase: RunPhase,
    setup: Option<RunSetup>,
    motion: Option<MotionState>,
    log: RunLog,
}

impl Default for Simulation {
    fn default() -> Self {
        Simulation::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        Simulation {
            phase: RunPhase::Idle,
            setup: None,
            motion: None,
            log: RunLog::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    pub fn setup(&self) -> Option<&RunSetup> {
        self.setup.as_ref()
    }

    pub fn pose(&self) -> Option<Pose> {
        self.motion.as_ref().map(MotionState::pose)
    }

    pub fn time_elapsed(&self) -> f64 {
        self.motion.as_ref().map_or(0.0, MotionState::time_elapsed)
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn into_log(self) -> RunLog {
        self.log
    }

    /// Install a new static configuration and place the robot at its initial pose.
    pub fn configure(&mut self, setup: RunSetup) -> anyhow::Result<()> {
        ensure!(self.phase != RunPhase::Running, "cannot reconfigure a running simulation");
        ensure!(
            setup.duration.is_finite() && setup.duration > 0.0,
            "run duration must be positive, got {}",
            setup.duration
        );
        let motion = MotionState::new(setup.initial_pose, setup.dt)
            .and_then(|m| m.with_substeps(setup.substeps))
            .context("invalid motion setup")?;

        self.log = match setup.controller {
            // Free-run has no error to settle on.
            Controller::FreeRun(_) => RunLog::new(),
            _ => RunLog::with_settle_filter(SettleFilter::default()),
        };
        info!(initial_pose = %setup.initial_pose, dt = setup.dt, duration = setup.duration, "Simulation configured");
        self.motion = Some(motion);
        self.setup = Some(setup);
        self.phase = RunPhase::Configured;
        Ok(())
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        ensure!(
            self.phase == RunPhase::Configured,
            "can only start a configured simulation (currently {:?})",
            self.phase
        );
        self.phase = RunPhase::Running;
        info!(pose = ?self.pose(), "Simulation started");
        Ok(())
    }

    /// Back to `Configured` after a stop: clears the log and the clock, keeps
    /// the configuration and the robot where it stopped.
    pub fn restart(&mut self) -> anyhow::Result<()> {
        ensure!(
            self.phase == RunPhase::Stopped,
            "can only restart a stopped simulation (currently {:?})",
            self.phase
        );
        if let Some(motion) = self.motion.as_mut() {
            motion.reset();
        }
        self.log.clear();
        self.phase = RunPhase::Configured;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.phase == RunPhase::Running {
            self.phase = RunPhase::Stopped;
            info!(t = self.time_elapsed(), pose = ?self.pose(), "Simulation stopped");
        }
    }

    /// Compute one command, step the robot, record and return the sample.
    /// Moves to `Stopped` once the run duration is reached.
    pub fn tick(&mut self) -> anyhow::Result<TickSample> {
        ensure!(self.is_running(), "tick called while {:?}", self.phase);
        let (Some(setup), Some(motion)) = (self.setup.as_ref(), self.motion.as_mut()) else {
            bail!("running simulation has no motion state");
        };

        let current = motion.pose();
        let (velocity, reference) = match &setup.controller {
            Controller::FreeRun(velocity) => (*velocity, None),
            Controller::Regulation(regulator) => (regulator.compute_velocity(current), None),
            Controller::Tracking { trajectory, controller } => {
                let reference = trajectory.reference_at(motion.time_elapsed());
                (controller.compute_velocity(current, &reference), Some(reference))
            }
        };

        let pose = motion.step(velocity);
        let error = match (&setup.controller, reference) {
            (Controller::Regulation(regulator), _) => regulator.error(pose),
            (_, Some(reference)) => PoseError::between(reference.pose, pose),
            _ => PoseError::ZERO,
        };
        let sample = TickSample {
            t: motion.time_elapsed(),
            pose,
            velocity,
            error,
        };
        debug!(
            t = sample.t,
            x = pose.x,
            y = pose.y,
            theta = pose.theta,
            vx = velocity.vx,
            vy = velocity.vy,
            w = velocity.w,
            "Tick"
        );

        // Half a step of slack so float drift cannot add an extra tick.
        let finished = sample.t >= setup.duration - 0.5 * setup.dt;
        self.log.record(&sample);
        if finished {
            self.stop();
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omni_control::ControlGain;

    fn regulation_setup(duration: f64) -> RunSetup {
        RunSetup {
            initial_pose: Pose::new(0.0, 0.0, 0.0),
            dt: 0.1,
            substeps: 4,
            duration,
            controller: Controller::Regulation(PoseRegulator::new(Pose::new(5.0, 5.0, 0.0), ControlGain::new(0.4))),
        }
    }

    #[test]
    fn test_phase_transitions() {
        let mut sim = Simulation::new();
        assert_eq!(sim.phase(), RunPhase::Idle);
        assert!(sim.start().is_err());
        assert!(sim.tick().is_err());

        sim.configure(regulation_setup(1.0)).unwrap();
        assert_eq!(sim.phase(), RunPhase::Configured);
        assert!(sim.tick().is_err());

        sim.start().unwrap();
        assert!(sim.configure(regulation_setup(1.0)).is_err());
        assert!(sim.restart().is_err());

        sim.stop();
        assert_eq!(sim.phase(), RunPhase::Stopped);
        assert!(sim.start().is_err());
        sim.restart().unwrap();
        assert_eq!(sim.phase(), RunPhase::Configured);
    }

    #[test]
    fn test_run_stops_after_duration() {
        let mut sim = Simulation::new();
        sim.configure(regulation_setup(2.0)).unwrap();
        sim.start().unwrap();
        let mut ticks = 0;
        while sim.is_running() {
            sim.tick().unwrap();
            ticks += 1;
        }
        assert_eq!(ticks, 20);
        assert_eq!(sim.phase(), RunPhase::Stopped);
        assert!((sim.time_elapsed() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_configure_rejects_bad_setup() {
        let mut sim = Simulation::new();
        let mut setup = regulation_setup(1.0);
        setup.dt = 0.0;
        assert!(sim.configure(setup).is_err());
        assert_eq!(sim.phase(), RunPhase::Idle);

        let mut setup = regulation_setup(1.0);
        setup.substeps = 0;
        assert!(sim.configure(setup).is_err());

        assert!(sim.configure(regulation_setup(0.0)).is_err());
    }

    #[test]
    fn test_free_run_error_is_zero() {
        let mut sim = Simulation::new();
        sim.configure(RunSetup {
            initial_pose: Pose::new(1.0, 1.0, 0.0),
            dt: 0.5,
            substeps: 4,
            duration: 1.0,
            controller: Controller::FreeRun(BodyVelocity::new(1.0, 0.0, 0.0)),
        })
        .unwrap();
        sim.start().unwrap();
        let sample = sim.tick().unwrap();
        assert_eq!(sample.error, PoseError::ZERO);
        assert!((sample.pose.x - 1.5).abs() < 1e-9);
        assert!((sample.t - 0.5).abs() < 1e-12);
        sim.tick().unwrap();
        assert_eq!(sim.phase(), RunPhase::Stopped);
        assert_eq!(sim.log().rows().len(), 2);
    }

    #[test]
    fn test_regulation_error_is_goal_minus_new_pose() {
        let mut sim = Simulation::new();
        sim.configure(regulation_setup(1.0)).unwrap();
        sim.start().unwrap();
        let sample = sim.tick().unwrap();
        assert!((sample.error.x - (5.0 - sample.pose.x)).abs() < 1e-12);
        assert!((sample.error.y - (5.0 - sample.pose.y)).abs() < 1e-12);
        assert!(sample.error.x < 5.0);
    }

    #[test]
    fn test_restart_continues_from_last_pose() {
        let mut sim = Simulation::new();
        sim.configure(regulation_setup(1.0)).unwrap();
        sim.start().unwrap();
        while sim.is_running() {
            sim.tick().unwrap();
        }
        let stopped_at = sim.pose().unwrap();
        assert!(!sim.log().is_empty());

        sim.restart().unwrap();
        assert_eq!(sim.time_elapsed(), 0.0);
        assert_eq!(sim.pose(), Some(stopped_at));
        assert!(sim.log().is_empty());

        sim.start().unwrap();
        let first = sim.tick().unwrap();
        // Continuing toward the same goal from where it stopped, not from the origin.
        assert!(first.pose.x > stopped_at.x);
        assert!((first.t - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_reconfigure_after_stop_moves_robot() {
        let mut sim = Simulation::new();
        sim.configure(regulation_setup(0.5)).unwrap();
        sim.start().unwrap();
        while sim.is_running() {
            sim.tick().unwrap();
        }
        let mut setup = regulation_setup(0.5);
        setup.initial_pose = Pose::new(-3.0, 1.0, 0.2);
        sim.configure(setup).unwrap();
        assert_eq!(sim.pose(), Some(Pose::new(-3.0, 1.0, 0.2)));
        assert!(sim.log().is_empty());
    }
}
