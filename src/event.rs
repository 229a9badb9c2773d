//! Device events, commands, and the per-event-kind listener trait.

use crate::types::{Arm, DeviceInfo, OrientationSample, Pose, UnlockType, WarmupState, XDirection};

/// An event delivered by the device layer. Timestamps are device microseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Paired {
        timestamp_us: u64,
        info: DeviceInfo,
    },
    Unpaired {
        timestamp_us: u64,
    },
    Connected {
        timestamp_us: u64,
    },
    Disconnected {
        timestamp_us: u64,
    },
    ArmSync {
        timestamp_us: u64,
        arm: Arm,
        x_direction: XDirection,
        /// Band rotation about the arm, radians.
        rotation: f64,
        warmup_state: WarmupState,
    },
    ArmUnsync {
        timestamp_us: u64,
    },
    Unlocked {
        timestamp_us: u64,
    },
    Locked {
        timestamp_us: u64,
    },
    Pose {
        timestamp_us: u64,
        pose: Pose,
    },
    Orientation(OrientationSample),
}

impl DeviceEvent {
    pub fn timestamp_us(&self) -> u64 {
        match self {
            DeviceEvent::Paired { timestamp_us, .. }
            | DeviceEvent::Unpaired { timestamp_us }
            | DeviceEvent::Connected { timestamp_us }
            | DeviceEvent::Disconnected { timestamp_us }
            | DeviceEvent::ArmSync { timestamp_us, .. }
            | DeviceEvent::ArmUnsync { timestamp_us }
            | DeviceEvent::Unlocked { timestamp_us }
            | DeviceEvent::Locked { timestamp_us }
            | DeviceEvent::Pose { timestamp_us, .. } => *timestamp_us,
            DeviceEvent::Orientation(sample) => sample.timestamp_us,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::Paired { .. } => "paired",
            DeviceEvent::Unpaired { .. } => "unpaired",
            DeviceEvent::Connected { .. } => "connected",
            DeviceEvent::Disconnected { .. } => "disconnected",
            DeviceEvent::ArmSync { .. } => "arm-sync",
            DeviceEvent::ArmUnsync { .. } => "arm-unsync",
            DeviceEvent::Unlocked { .. } => "unlocked",
            DeviceEvent::Locked { .. } => "locked",
            DeviceEvent::Pose { .. } => "pose",
            DeviceEvent::Orientation(_) => "orientation",
        }
    }
}

/// A command sent back to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Lock,
    Unlock(UnlockType),
}

/// Receives device events, one method per event kind. All methods default to no-ops.
pub trait DeviceListener: Send {
    fn on_pair(&mut self, _timestamp_us: u64, _info: &DeviceInfo) {}

    fn on_unpair(&mut self, _timestamp_us: u64) {}

    fn on_connect(&mut self, _timestamp_us: u64) {}

    fn on_disconnect(&mut self, _timestamp_us: u64) {}

    fn on_arm_sync(
        &mut self,
        _timestamp_us: u64,
        _arm: Arm,
        _x_direction: XDirection,
        _rotation: f64,
        _warmup_state: WarmupState,
    ) {
    }

    fn on_arm_unsync(&mut self, _timestamp_us: u64) {}

    fn on_unlock(&mut self, _timestamp_us: u64) {}

    fn on_lock(&mut self, _timestamp_us: u64) {}

    fn on_pose(&mut self, _timestamp_us: u64, _pose: Pose) {}

    fn on_orientation(&mut self, _sample: &OrientationSample) {}
}

/// Route `event` to the matching `listener` method.
pub fn dispatch(listener: &mut dyn DeviceListener, event: &DeviceEvent) {
    match event {
        DeviceEvent::Paired { timestamp_us, info } => listener.on_pair(*timestamp_us, info),
        DeviceEvent::Unpaired { timestamp_us } => listener.on_unpair(*timestamp_us),
        DeviceEvent::Connected { timestamp_us } => listener.on_connect(*timestamp_us),
        DeviceEvent::Disconnected { timestamp_us } => listener.on_disconnect(*timestamp_us),
        DeviceEvent::ArmSync {
            timestamp_us,
            arm,
            x_direction,
            rotation,
            warmup_state,
        } => listener.on_arm_sync(*timestamp_us, *arm, *x_direction, *rotation, *warmup_state),
        DeviceEvent::ArmUnsync { timestamp_us } => listener.on_arm_unsync(*timestamp_us),
        DeviceEvent::Unlocked { timestamp_us } => listener.on_unlock(*timestamp_us),
        DeviceEvent::Locked { timestamp_us } => listener.on_lock(*timestamp_us),
        DeviceEvent::Pose { timestamp_us, pose } => listener.on_pose(*timestamp_us, *pose),
        DeviceEvent::Orientation(sample) => listener.on_orientation(sample),
    }
}
