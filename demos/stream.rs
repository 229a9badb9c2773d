//! Stream calibrated orientation from a simulated band to stdout.
//!
//! The band turns about the vertical axis. After the first second of
//! samples the current pose becomes the reference, so yaw restarts from zero.
//!
//! Usage: cargo run --example stream

use myobot::{Arm, Session, SessionConfig, SimulatedDevice};
use std::time::Duration;

const SAMPLE_RATE_HZ: u32 = 50;

fn main() {
    env_logger::init();

    let device = SimulatedDevice::rotating(Arm::Right, 0.5, SAMPLE_RATE_HZ, 250);
    let mut session = match Session::initialize(device, SessionConfig::from_env()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start session: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(info) = session.state().device_info() {
        println!("Device:   {}", info.name);
        println!("Firmware: {}", info.firmware_version);
    }
    println!();

    let mut count: u64 = 0;
    loop {
        match session.run_once(Duration::from_millis(100)) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
        let Some(t) = session.state().last_timestamp_us() else {
            continue;
        };
        count += 1;

        if count == u64::from(SAMPLE_RATE_HZ) {
            session.update_reference();
            println!("-- reference updated --");
        }
        if count % 5 == 0 {
            let a = session.orientation().to_degrees();
            println!(
                "t={:>8} us  roll={:>7.2}°  pitch={:>7.2}°  yaw={:>7.2}°  arm={:?}  locked={}",
                t,
                a.roll,
                a.pitch,
                a.yaw,
                session.state().arm(),
                session.is_locked(),
            );
        }
    }

    println!("{} events", count);
}
