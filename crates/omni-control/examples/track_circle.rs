use omni_control::{ControlGain, PoseError, SaturationLimits, TrackingController, Trajectory, TrajectoryShape};
use omni_kinematics::{MotionState, Pose};

fn main() {
    let period = 40.0;
    let dt = 0.1;

    let trajectory = match Trajectory::configure(TrajectoryShape::Circle, period) {
        Ok(trajectory) => trajectory,
        Err(e) => {
            eprintln!("Failed to configure trajectory: {}", e);
            return;
        }
    };
    let limits = match SaturationLimits::new(1.5, 1.5, 0.5) {
        Ok(limits) => limits,
        Err(e) => {
            eprintln!("Failed to build saturation limits: {}", e);
            return;
        }
    };
    let controller = TrackingController::new(ControlGain::clamped(0.4)).with_saturation(limits);
    let mut state = match MotionState::new(Pose::new(2.0, 2.0, 0.0), dt) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Failed to initialize motion state: {}", e);
            eprintln!("Please ensure dt ({}) is positive.", dt);
            return;
        }
    };

    println!("Tracking {}", trajectory);
    println!("  Saturation: {}", limits);
    println!("  Start:      {}", state.pose());

    let ticks = (period / dt) as usize;
    for tick in 0..ticks {
        let reference = trajectory.reference_at(state.time_elapsed());
        let command = controller.compute_velocity(state.pose(), &reference);
        let pose = state.step(command);
        if tick % 50 == 0 {
            let error = PoseError::between(reference.pose, pose);
            println!("t = {:>5.1} s  pose {}  cmd {}  err {}", state.time_elapsed(), pose, command, error);
        }
    }

    println!("\nFinal State: {}", state);
}
