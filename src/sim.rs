//! Scripted backend for tests and demos.

use crate::backend::DeviceBackend;
use crate::event::{DeviceCommand, DeviceEvent};
use crate::types::{Arm, DeviceInfo, OrientationSample, Quaternion, WarmupState, XDirection};
use crate::{MyoError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Commands a `SimulatedDevice` received, shared with the test that built it.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<DeviceCommand>>>,
}

impl CommandLog {
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut c) = self.commands.lock() {
            c.clear();
        }
    }

    fn record(&self, command: DeviceCommand) {
        if let Ok(mut c) = self.commands.lock() {
            c.push(command);
        }
    }
}

/// A device that replays a queue of events.
///
/// When the queue is empty, `poll_event` sleeps for the requested timeout
/// like a quiet radio link.
pub struct SimulatedDevice {
    info: DeviceInfo,
    present: bool,
    fail_commands: bool,
    events: VecDeque<DeviceEvent>,
    log: CommandLog,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self {
            info: DeviceInfo {
                name: "Simulated Band".into(),
                firmware_version: "1.5.1970".into(),
            },
            present: true,
            fail_commands: false,
            events: VecDeque::new(),
            log: CommandLog::default(),
        }
    }

    /// A device that never shows up during discovery.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn with_info(mut self, info: DeviceInfo) -> Self {
        self.info = info;
        self
    }

    /// Make every command fail with `CommandFailed`.
    pub fn with_failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = DeviceEvent>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn push_event(&mut self, event: DeviceEvent) {
        self.events.push_back(event);
    }

    /// Handle on the commands this device receives.
    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// A band synced on `arm` turning about the vertical axis at `yaw_rate`
    /// rad/s, sampled `count` times at `sample_rate_hz`.
    pub fn rotating(arm: Arm, yaw_rate: f64, sample_rate_hz: u32, count: usize) -> Self {
        let period_us = 1_000_000 / u64::from(sample_rate_hz.max(1));
        let mut device = Self::new().with_events([
            DeviceEvent::ArmSync {
                timestamp_us: 0,
                arm,
                x_direction: XDirection::TowardWrist,
                rotation: 0.0,
                warmup_state: WarmupState::Warm,
            },
            DeviceEvent::Unlocked { timestamp_us: 0 },
        ]);
        for i in 0..count {
            let timestamp_us = (i as u64 + 1) * period_us;
            let t = timestamp_us as f64 / 1e6;
            device.push_event(DeviceEvent::Orientation(OrientationSample {
                timestamp_us,
                quaternion: Quaternion::from_axis_angle([0.0, 0.0, 1.0], yaw_rate * t),
            }));
        }
        device
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for SimulatedDevice {
    fn wait_for_device(&mut self, timeout: Duration) -> Result<Option<DeviceInfo>> {
        if self.present {
            Ok(Some(self.info.clone()))
        } else {
            std::thread::sleep(timeout);
            Ok(None)
        }
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<DeviceEvent>> {
        match self.events.pop_front() {
            Some(event) => Ok(Some(event)),
            None => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn send_command(&mut self, command: DeviceCommand) -> Result<()> {
        if self.fail_commands {
            return Err(MyoError::CommandFailed(format!("{:?} rejected", command)));
        }
        self.log.record(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnlockType;

    #[test]
    fn test_replays_in_order() {
        let mut dev = SimulatedDevice::new().with_events([
            DeviceEvent::Locked { timestamp_us: 1 },
            DeviceEvent::Unlocked { timestamp_us: 2 },
        ]);
        let zero = Duration::ZERO;
        assert_eq!(
            dev.poll_event(zero).unwrap(),
            Some(DeviceEvent::Locked { timestamp_us: 1 })
        );
        assert_eq!(
            dev.poll_event(zero).unwrap(),
            Some(DeviceEvent::Unlocked { timestamp_us: 2 })
        );
        assert_eq!(dev.poll_event(zero).unwrap(), None);
    }

    #[test]
    fn test_command_log_is_shared() {
        let mut dev = SimulatedDevice::new();
        let log = dev.command_log();
        dev.send_command(DeviceCommand::Unlock(UnlockType::Timed)).unwrap();
        assert_eq!(log.commands(), vec![DeviceCommand::Unlock(UnlockType::Timed)]);
        log.clear();
        assert!(log.commands().is_empty());
    }

    #[test]
    fn test_failing_commands() {
        let mut dev = SimulatedDevice::new().with_failing_commands();
        assert!(matches!(
            dev.send_command(DeviceCommand::Lock),
            Err(MyoError::CommandFailed(_))
        ));
        assert!(dev.command_log().commands().is_empty());
    }

    #[test]
    fn test_absent_device() {
        let mut dev = SimulatedDevice::absent();
        assert_eq!(dev.wait_for_device(Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn test_rotating_script() {
        let dev = SimulatedDevice::rotating(Arm::Right, 1.0, 50, 10);
        // Arm sync + unlock + samples.
        assert_eq!(dev.pending_events(), 12);
        match dev.events.back() {
            Some(DeviceEvent::Orientation(sample)) => {
                assert_eq!(sample.timestamp_us, 200_000);
                let expected = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.2);
                assert!(sample.quaternion.approx_eq(&expected, 1e-12));
            }
            other => panic!("unexpected tail event {:?}", other),
        }
    }
}
