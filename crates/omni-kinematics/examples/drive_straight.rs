use omni_kinematics::*;

fn main() {
    let initial_pose = Pose::from_degrees(2.0, 2.0, 30.0);
    let command = BodyVelocity::new(1.0, 0.5, 0.0); // forward and slightly left, no turning
    let dt = 0.1; // Time step in seconds
    let num_steps = 10;

    match MotionState::new(initial_pose, dt) {
        Ok(mut state) => {
            println!("Initializing simulation...");
            println!("  Initial State:");
            println!("    Pose:         {}", state.pose());
            println!("    Command:      {}", command);
            println!("  Simulation Settings:");
            println!("    Time Step:    {} s", state.dt());
            println!("    Num Steps:    {}", num_steps);
            println!("\nSimulating...");

            for i in 0..num_steps {
                let pose = state.step(command);
                println!("Step {:>2} (t = {:.1} s): Pose: {}", i + 1, state.time_elapsed(), pose);
            }

            println!("\nSimulation complete.");
            println!("Final State: {}", state);
        }
        Err(e) => {
            eprintln!("Failed to initialize motion state: {}", e);
            eprintln!("Please ensure dt ({}) is positive.", dt);
        }
    }
}
