use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::bus::Topic;
use crate::settings::SimulationSettings;
use crate::simulation::{Controller, RunSetup, Simulation, TickSample};
use crate::telemetry::RunLog;

/// Points sampled along one loop when summarising the path. Fixed so that
/// startup cost does not depend on the period.
const PATH_SAMPLES: usize = 1000;

/// Run one simulation to completion or until Ctrl-C.
pub async fn run(settings: &SimulationSettings, topic: &Topic<TickSample>) -> anyhow::Result<RunLog> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_until(settings, topic, shutdown).await
}

/// Run one simulation, stopping early if `shutdown` completes.
///
/// The loop is the only writer of the robot state. Each tick is published on
/// `topic`; the returned log holds the full run.
pub async fn run_until<F>(settings: &SimulationSettings, topic: &Topic<TickSample>, shutdown: F) -> anyhow::Result<RunLog>
where
    F: Future<Output = ()>,
{
    let setup = RunSetup::from_settings(settings)?;
    describe(&setup);

    let mut sim = Simulation::new();
    sim.configure(setup)?;
    sim.start()?;

    let mut ticker = pacing(settings.tick_rate_hz);
    tokio::pin!(shutdown);

    while sim.is_running() {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                warn!(t = sim.time_elapsed(), "Shutdown requested, stopping run.");
                sim.stop();
                break;
            }
            _ = pace(&mut ticker) => {}
        }
        let sample = sim.tick()?;
        topic.publish(sample);
    }

    info!(
        t = sim.time_elapsed(),
        final_pose = ?sim.pose(),
        rows = sim.log().rows().len(),
        "Run finished"
    );
    Ok(sim.into_log())
}

/// Log progress every `every` seconds of simulated time until the topic closes.
pub async fn log_telemetry(mut rx: broadcast::Receiver<Arc<TickSample>>, every: f64) -> u64 {
    let mut received = 0;
    let mut next_report = 0.0;
    loop {
        match rx.recv().await {
            Ok(sample) => {
                received += 1;
                if sample.t >= next_report {
                    info!(
                        t = sample.t,
                        x = sample.pose.x,
                        y = sample.pose.y,
                        theta = sample.pose.theta,
                        error = sample.error.position_norm(),
                        "Telemetry"
                    );
                    next_report = sample.t + every;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Telemetry receiver lagged.");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    received
}

fn pacing(tick_rate_hz: f64) -> Option<Interval> {
    if tick_rate_hz > 0.0 {
        let mut ticker = time::interval(Duration::from_secs_f64(1.0 / tick_rate_hz));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(ticker)
    } else {
        None
    }
}

async fn pace(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        // Unpaced runs still yield so shutdown and subscribers get a turn.
        None => tokio::task::yield_now().await,
    }
}

fn describe(setup: &RunSetup) {
    match &setup.controller {
        Controller::FreeRun(velocity) => info!(%velocity, "Free run"),
        Controller::Regulation(regulator) => {
            info!(goal = %regulator.goal(), gain = %regulator.gain(), "Pose regulation")
        }
        Controller::Tracking { trajectory, controller } => {
            let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
            let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
            for (x, y) in trajectory.path_points(PATH_SAMPLES) {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
            info!(
                %trajectory,
                gain = %controller.gain(),
                saturation = ?controller.saturation(),
                "Trajectory tracking, path spans x [{:.2}, {:.2}], y [{:.2}, {:.2}]",
                min_x,
                max_x,
                min_y,
                max_y
            );
        }
    }
}
