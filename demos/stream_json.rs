//! Stream calibrated orientation as JSON lines.
//!
//! {"roll":0.0,"pitch":0.0,"yaw":12.5,"locked":false,"t":500000}
//!
//! Usage: cargo run --release --example stream_json

use myobot::{Arm, DeviceEvent, Session, SessionConfig, SimulatedDevice};
use std::io::{self, Write};
use std::time::Duration;

fn main() {
    env_logger::init();

    let device = SimulatedDevice::rotating(Arm::Left, 1.0, 50, 500);
    let mut session = match Session::initialize(device, SessionConfig::from_env()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start session: {}", e);
            std::process::exit(1);
        }
    };
    let events = session.subscribe(1);

    eprintln!("Streaming JSON...");

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    while let Ok(true) = session.run_once(Duration::from_millis(100)) {
        let Ok(DeviceEvent::Orientation(sample)) = events.try_recv() else {
            continue;
        };
        let a = session.orientation().to_degrees();
        let _ = writeln!(
            out,
            "{{\"roll\":{:.1},\"pitch\":{:.1},\"yaw\":{:.1},\"locked\":{},\"t\":{}}}",
            a.roll,
            a.pitch,
            a.yaw,
            session.is_locked(),
            sample.timestamp_us,
        );
        let _ = out.flush();
    }
}
