use crate::calibrator::{OrientationCalibrator, ReferenceFrame};
use crate::event::DeviceEvent;
use crate::types::{
    Arm, DeviceInfo, EulerAngles, Pose, Quaternion, StatusFlags, WarmupState, XDirection,
};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything the session knows about the band, updated from device events.
///
/// Shared between the thread that pumps events and any number of readers.
/// A single lock covers the calibrator and the status fields, so a reader
/// never sees a reference paired with a stale inverse.
pub struct SessionState {
    inner: Mutex<Collector>,
}

#[derive(Debug)]
struct Collector {
    calibrator: OrientationCalibrator,
    info: Option<DeviceInfo>,
    paired: bool,
    connected: bool,
    attached: bool,
    on_arm: bool,
    unlocked: bool,
    arm: Arm,
    x_direction: XDirection,
    arm_rotation: f64,
    warmup_state: WarmupState,
    pose: Pose,
    last_timestamp_us: Option<u64>,
}

impl SessionState {
    pub fn new(invert_angles: bool) -> Self {
        Self {
            inner: Mutex::new(Collector {
                calibrator: OrientationCalibrator::new(invert_angles),
                info: None,
                paired: false,
                connected: false,
                attached: false,
                on_arm: false,
                unlocked: false,
                arm: Arm::Unknown,
                x_direction: XDirection::Unknown,
                arm_rotation: 0.0,
                warmup_state: WarmupState::Unknown,
                pose: Pose::Unknown,
                last_timestamp_us: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Collector> {
        // Every field is a plain value; a panic mid-update cannot break an invariant.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a device found during discovery.
    pub(crate) fn mark_paired(&self, info: DeviceInfo) {
        let mut c = self.lock();
        c.info = Some(info);
        c.paired = true;
        c.attached = true;
    }

    /// Fold one event into the state.
    pub fn apply(&self, event: &DeviceEvent) {
        let mut c = self.lock();
        c.last_timestamp_us = Some(event.timestamp_us());

        match event {
            DeviceEvent::Paired { info, .. } => {
                c.info = Some(info.clone());
                c.paired = true;
                c.attached = true;
            }
            DeviceEvent::Unpaired { .. } => {
                c.paired = false;
                c.on_arm = false;
                c.unlocked = false;
                c.attached = false;
            }
            DeviceEvent::Connected { .. } => {
                c.connected = true;
                c.attached = true;
            }
            DeviceEvent::Disconnected { .. } => {
                c.connected = false;
                c.attached = false;
            }
            DeviceEvent::ArmSync {
                arm,
                x_direction,
                rotation,
                warmup_state,
                ..
            } => {
                c.on_arm = true;
                c.arm = *arm;
                c.x_direction = *x_direction;
                c.arm_rotation = *rotation;
                c.warmup_state = *warmup_state;
                c.attached = true;
            }
            DeviceEvent::ArmUnsync { .. } => {
                c.on_arm = false;
                c.attached = false;
            }
            DeviceEvent::Unlocked { .. } => {
                c.unlocked = true;
                c.attached = true;
            }
            DeviceEvent::Locked { .. } => {
                c.unlocked = false;
                c.attached = true;
            }
            DeviceEvent::Pose { pose, .. } => {
                c.pose = *pose;
                c.attached = true;
            }
            DeviceEvent::Orientation(sample) => {
                c.calibrator.update(sample.quaternion);
                c.attached = true;
            }
        }
    }

    /// Make the most recent raw sample the zero orientation.
    pub fn update_reference(&self) {
        let mut c = self.lock();
        c.calibrator.recalibrate();
        log::info!(
            "Reference orientation updated (rpy={:?})",
            c.calibrator.reference_angles().as_array()
        );
    }

    /// Make `reference` the zero orientation.
    pub fn set_reference(&self, reference: Quaternion) {
        self.lock().calibrator.set_reference(reference);
    }

    /// Roll/pitch/yaw of the latest sample relative to the reference, radians.
    pub fn orientation(&self) -> EulerAngles {
        self.lock().calibrator.angles()
    }

    /// Roll/pitch/yaw of the reference itself, radians.
    pub fn reference_orientation(&self) -> EulerAngles {
        self.lock().calibrator.reference_angles()
    }

    pub fn reference_frame(&self) -> ReferenceFrame {
        self.lock().calibrator.frame()
    }

    pub fn relative_quaternion(&self) -> Quaternion {
        self.lock().calibrator.relative()
    }

    pub fn raw_quaternion(&self) -> Quaternion {
        self.lock().calibrator.raw()
    }

    pub fn arm(&self) -> Arm {
        self.lock().arm
    }

    pub fn x_direction(&self) -> XDirection {
        self.lock().x_direction
    }

    /// Band rotation about the arm reported at the last arm sync.
    pub fn arm_rotation(&self) -> f64 {
        self.lock().arm_rotation
    }

    pub fn warmup_state(&self) -> WarmupState {
        self.lock().warmup_state
    }

    pub fn is_on_arm(&self) -> bool {
        self.lock().on_arm
    }

    pub fn is_locked(&self) -> bool {
        !self.lock().unlocked
    }

    pub fn pose(&self) -> Pose {
        self.lock().pose
    }

    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    /// False once the device has unpaired.
    pub fn is_active(&self) -> bool {
        self.lock().paired
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.lock().info.clone()
    }

    pub fn last_timestamp_us(&self) -> Option<u64> {
        self.lock().last_timestamp_us
    }

    pub fn status(&self) -> StatusFlags {
        let c = self.lock();
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::PAIRED, c.paired);
        flags.set(StatusFlags::CONNECTED, c.connected);
        flags.set(StatusFlags::ATTACHED, c.attached);
        flags.set(StatusFlags::ON_ARM, c.on_arm);
        flags.set(StatusFlags::UNLOCKED, c.unlocked);
        flags
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("status", &self.status())
            .field("orientation", &self.orientation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrientationSample;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::Arc;

    fn orientation(ts: u64, q: Quaternion) -> DeviceEvent {
        DeviceEvent::Orientation(OrientationSample {
            timestamp_us: ts,
            quaternion: q,
        })
    }

    #[test]
    fn test_initial_state() {
        let state = SessionState::new(false);
        assert!(state.is_locked());
        assert!(!state.is_on_arm());
        assert_eq!(state.arm(), Arm::Unknown);
        assert_eq!(state.pose(), Pose::Unknown);
        assert_eq!(state.orientation(), EulerAngles::ZERO);
        assert_eq!(state.reference_orientation(), EulerAngles::ZERO);
        assert_eq!(state.status(), StatusFlags::empty());
        assert_eq!(state.last_timestamp_us(), None);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let state = SessionState::new(false);
        state.mark_paired(DeviceInfo {
            name: "band".into(),
            firmware_version: "1.5.1970".into(),
        });
        assert!(state.is_active());

        state.apply(&DeviceEvent::ArmSync {
            timestamp_us: 10,
            arm: Arm::Left,
            x_direction: XDirection::TowardElbow,
            rotation: 0.25,
            warmup_state: WarmupState::Cold,
        });
        state.apply(&DeviceEvent::Unlocked { timestamp_us: 11 });
        state.apply(&DeviceEvent::Pose {
            timestamp_us: 12,
            pose: Pose::WaveOut,
        });

        assert!(state.is_on_arm());
        assert_eq!(state.arm(), Arm::Left);
        assert_eq!(state.x_direction(), XDirection::TowardElbow);
        assert_eq!(state.warmup_state(), WarmupState::Cold);
        assert!((state.arm_rotation() - 0.25).abs() < 1e-12);
        assert!(!state.is_locked());
        assert_eq!(state.pose(), Pose::WaveOut);
        assert_eq!(state.last_timestamp_us(), Some(12));
        assert!(state
            .status()
            .contains(StatusFlags::PAIRED | StatusFlags::ATTACHED | StatusFlags::ON_ARM | StatusFlags::UNLOCKED));

        state.apply(&DeviceEvent::ArmUnsync { timestamp_us: 13 });
        assert!(!state.is_on_arm());
        assert!(!state.is_attached());

        // Any later device event reattaches.
        state.apply(&DeviceEvent::Locked { timestamp_us: 14 });
        assert!(state.is_attached());
        assert!(state.is_locked());

        state.apply(&DeviceEvent::Unpaired { timestamp_us: 15 });
        assert!(!state.is_active());
        assert!(!state.is_attached());
        assert!(state.is_locked());
        assert!(!state.is_on_arm());
    }

    #[test]
    fn test_connect_disconnect() {
        let state = SessionState::new(false);
        state.apply(&DeviceEvent::Connected { timestamp_us: 1 });
        assert!(state.status().contains(StatusFlags::CONNECTED | StatusFlags::ATTACHED));
        state.apply(&DeviceEvent::Disconnected { timestamp_us: 2 });
        assert!(!state.status().intersects(StatusFlags::CONNECTED | StatusFlags::ATTACHED));
    }

    #[test]
    fn test_orientation_and_reference() {
        let state = SessionState::new(false);
        let yaw90 = Quaternion::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);

        state.apply(&orientation(1, yaw90));
        assert!((state.orientation().yaw - FRAC_PI_2).abs() < 1e-9);
        assert_eq!(state.raw_quaternion(), yaw90);

        state.update_reference();
        assert!((state.reference_orientation().yaw - FRAC_PI_2).abs() < 1e-9);
        // No new sample needed for the live angles to follow the new reference.
        assert!(state.orientation().yaw.abs() < 1e-9);

        state.apply(&orientation(2, yaw90));
        assert!(state.orientation().yaw.abs() < 1e-9);
        assert!(state
            .relative_quaternion()
            .approx_eq(&Quaternion::IDENTITY, 1e-9));
    }

    #[test]
    fn test_inverted_state() {
        let state = SessionState::new(true);
        let roll = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.5);
        state.apply(&orientation(1, roll));
        assert!((state.orientation().roll + 0.5).abs() < 1e-9);
        state.set_reference(roll);
        assert!((state.reference_orientation().roll + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_reference_swaps_stay_consistent() {
        let state = Arc::new(SessionState::new(false));
        let a = Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.9);
        let b = Quaternion::from_axis_angle([1.0, 0.0, 0.0], -0.4);

        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    state.set_reference(if i % 2 == 0 { a } else { b });
                }
            })
        };
        let sampler = {
            let state = state.clone();
            std::thread::spawn(move || {
                for i in 0..2_000u64 {
                    state.apply(&orientation(i, if i % 3 == 0 { a } else { b }));
                    let o = state.orientation();
                    assert!(o.roll.is_finite() && o.pitch.is_finite() && o.yaw.is_finite());
                }
            })
        };

        for _ in 0..2_000 {
            let frame = state.reference_frame();
            let product = frame.inverse() * frame.reference();
            assert!(product.approx_eq(&Quaternion::IDENTITY, 1e-9));
        }

        writer.join().unwrap();
        sampler.join().unwrap();
    }
}
