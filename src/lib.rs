//! # myobot - orientation bridge for Myo armbands
//!
//! Turns the band's raw orientation quaternions into roll/pitch/yaw relative
//! to a user-chosen reference pose. Provides:
//! - Orientation calibration against a swappable reference frame
//! - A device session tracking pairing, arm sync, lock state and poses
//! - A background event pump with lock/unlock requests from any thread
//! - C FFI for hosts that receive the vendor SDK callbacks
//!
//! ## Quick Start
//! ```no_run
//! use myobot::{Arm, Session, SessionConfig, SimulatedDevice};
//! use std::time::Duration;
//!
//! let device = SimulatedDevice::rotating(Arm::Right, 0.5, 50, 100);
//! let mut session = Session::initialize(device, SessionConfig::from_env()).unwrap();
//! session.run(Duration::from_millis(100)).unwrap();
//! session.update_reference();
//! session.run(Duration::from_millis(500)).unwrap();
//! println!("angles: {:?}", session.orientation());
//! ```

pub mod error;
pub mod types;
pub mod calibrator;
pub mod event;
pub mod config;
pub mod state;
pub mod backend;
pub mod sim;
pub mod session;
pub mod pump;
pub mod ffi;

pub use error::MyoError;
pub use types::*;
pub use calibrator::{quaternion_to_euler, OrientationCalibrator, ReferenceFrame};
pub use event::{DeviceCommand, DeviceEvent, DeviceListener};
pub use config::SessionConfig;
pub use state::SessionState;
pub use backend::{channel_backend, ChannelBackend, DeviceBackend, EventFeed};
pub use sim::SimulatedDevice;
pub use session::Session;
pub use pump::SessionHandle;

/// Result type alias for myobot operations.
pub type Result<T> = std::result::Result<T, MyoError>;
