// horizon_sim/examples/01_synchronous_cycles.rs

//! Drives a smoother by hand, without threads: producers are ticked in a loop and a
//! cycle runs after every odometry step.
//!
//! To run this example:
//! `cargo run --example 01_synchronous_cycles`

use horizon_core::identity;
use horizon_sim::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info,horizon_core=debug"))
        .init();

    let robot = RobotConfig::default();
    let device = identity::from_name(&robot.name);
    let trajectory = Trajectory::from_config(&robot);
    let rng = SimulationRng::new(7);

    let mut odometry = OdometryProducer::new(
        OdometryConfig {
            name: "wheel_odometry".to_string(),
            rate: 10.0,
            noise_stddev: [0.02, 0.005],
        },
        device,
        trajectory,
        rng.stream("wheel_odometry"),
    )?;
    let mut gps = PoseFixProducer::new(
        PoseFixConfig {
            name: "gps".to_string(),
            rate: 1.0,
            noise_stddev: [0.5, 0.05],
            latency: 0.0,
            huber_scale: Some(2.0),
        },
        device,
        trajectory,
        rng.stream("gps"),
    )?;

    let params = SmootherParams {
        lag_duration: 2.0,
        ..SmootherParams::default()
    };
    let mut smoother = Smoother::new(params, Box::new(LevenbergMarquardt::new()));
    let sender = smoother.sender();
    let reader = smoother.reader();
    let synchronizer = Synchronizer::pose_2d(device, 2.0);

    for index in 0..100u64 {
        let time = index as f64 / odometry.rate();
        if let Some(transaction) = odometry.measure(index, time)? {
            sender.submit(odometry.name(), transaction)?;
        }
        if index % 10 == 0 {
            if let Some(transaction) = gps.measure(index / 10, time)? {
                sender.submit(gps.name(), transaction)?;
            }
        }

        let report = smoother.run_cycle();
        for event in &report.events {
            println!("t={:.1}: {:?}", time, event);
        }

        if let Some(stamp) = reader.find_stable_stamp(&synchronizer) {
            if index % 10 == 9 {
                let position = reader.get_variable(&Variable::position_2d(stamp, device).uuid())?;
                let truth = trajectory.pose_at(stamp.as_secs_f64());
                println!(
                    "stable {}: estimate ({:.3}, {:.3}), truth ({:.3}, {:.3}), graph {} variables",
                    stamp,
                    position.data()[0],
                    position.data()[1],
                    truth.x,
                    truth.y,
                    reader.snapshot().variable_count()
                );
            }
        }
    }

    println!("{:#?}", reader.stats());
    Ok(())
}
