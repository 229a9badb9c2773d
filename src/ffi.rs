//! C FFI layer for myobot.
//!
//! Provides an opaque handle-based API for C/C++ hosts that receive vendor
//! SDK callbacks and for managed runtimes binding through them.
//! The generated C header is written to `include/myobot.h` by cbindgen.
//!
//! Typical flow: `mb_feed_create` → push a paired event from the vendor's
//! pair callback → `mb_session_open` → call `mb_session_run` periodically
//! while vendor callbacks keep pushing events into the feed.

use crate::backend::{channel_backend, ChannelBackend, EventFeed};
use crate::config::{SessionConfig, DEFAULT_EVENT_QUEUE_CAPACITY};
use crate::error::LastError;
use crate::event::{DeviceCommand, DeviceEvent};
use crate::session::Session;
use crate::types::{
    Arm, DeviceInfo, EulerAngles, Pose, Quaternion, UnlockType, WarmupState, XDirection,
};
use crate::{MyoError, Result};
use std::ffi::{c_char, c_int, c_void, CStr};
use std::time::Duration;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Command code passed to the host callback for a lock request.
pub const MB_COMMAND_LOCK: c_int = 0;
/// Command code for an unlock that re-locks after a timeout.
pub const MB_COMMAND_UNLOCK_TIMED: c_int = 1;
/// Command code for an unlock that holds until an explicit lock.
pub const MB_COMMAND_UNLOCK_HOLD: c_int = 2;

/// Host callback that forwards a command to the vendor device.
/// Returns true on success.
pub type MbCommandCallback = Option<unsafe extern "C" fn(user_data: *mut c_void, command: c_int) -> bool>;

/// Opaque event feed handle: the host pushes vendor events into it.
pub struct MbFeed {
    feed: EventFeed,
    backend: Option<ChannelBackend>,
}

/// Opaque session handle.
pub struct MbSession(Session<ChannelBackend>);

/// Session settings in C-compatible layout.
#[repr(C)]
pub struct MbConfig {
    /// Null-terminated application identifier, or NULL for the default.
    pub application_id: *const c_char,
    /// Device discovery timeout in milliseconds.
    pub discovery_timeout_ms: u32,
    pub invert_angles: bool,
    pub unlock_on_pose: bool,
    /// Unlock used by `mb_session_unlock` and pose auto-unlock: 0 = timed, 1 = hold.
    pub unlock_type: c_int,
}

/// Euler angles [roll, pitch, yaw].
#[repr(C)]
pub struct MbEuler {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl From<EulerAngles> for MbEuler {
    fn from(e: EulerAngles) -> Self {
        MbEuler {
            roll: e.roll,
            pitch: e.pitch,
            yaw: e.yaw,
        }
    }
}

struct HostCallback {
    callback: unsafe extern "C" fn(*mut c_void, c_int) -> bool,
    user_data: *mut c_void,
}

// The host guarantees `user_data` may be used from the thread that pumps the session.
unsafe impl Send for HostCallback {}

impl HostCallback {
    fn call(&self, command: DeviceCommand) -> Result<()> {
        let code = match command {
            DeviceCommand::Lock => MB_COMMAND_LOCK,
            DeviceCommand::Unlock(UnlockType::Timed) => MB_COMMAND_UNLOCK_TIMED,
            DeviceCommand::Unlock(UnlockType::Hold) => MB_COMMAND_UNLOCK_HOLD,
        };
        if unsafe { (self.callback)(self.user_data, code) } {
            Ok(())
        } else {
            Err(MyoError::CommandFailed(format!("host rejected {:?}", command)))
        }
    }
}

fn report<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            LAST_ERROR.set(&e);
            None
        }
    }
}

fn push(feed: *const MbFeed, event: DeviceEvent) -> c_int {
    if feed.is_null() {
        return -1;
    }
    let feed = unsafe { &*feed };
    match report(feed.feed.push(event)) {
        Some(()) => 0,
        None => -1,
    }
}

/// Create an event feed.
///
/// `callback` receives `MB_COMMAND_*` codes for lock/unlock requests; it may
/// be NULL, in which case commands fail. Returns NULL on error.
///
/// # Safety
/// `user_data` is passed back to `callback` verbatim, possibly from the
/// thread that calls `mb_session_run`.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_create(
    callback: MbCommandCallback,
    user_data: *mut c_void,
) -> *mut MbFeed {
    let host = callback.map(|callback| HostCallback {
        callback,
        user_data,
    });
    let (feed, backend) = channel_backend(
        DEFAULT_EVENT_QUEUE_CAPACITY,
        Box::new(move |command| match &host {
            Some(host) => host.call(command),
            None => Err(MyoError::CommandFailed("no command callback".into())),
        }),
    );
    Box::into_raw(Box::new(MbFeed {
        feed,
        backend: Some(backend),
    }))
}

/// Destroy a feed. Any session opened from it sees the feed disconnect.
///
/// # Safety
/// `feed` must be a pointer returned by `mb_feed_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_destroy(feed: *mut MbFeed) {
    if !feed.is_null() {
        drop(Box::from_raw(feed));
    }
}

/// Push an orientation sample. Returns 0 on success, -1 on error.
///
/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_orientation(
    feed: *const MbFeed,
    timestamp_us: u64,
    w: f64,
    x: f64,
    y: f64,
    z: f64,
) -> c_int {
    push(
        feed,
        DeviceEvent::Orientation(crate::types::OrientationSample {
            timestamp_us,
            quaternion: Quaternion::new(w, x, y, z),
        }),
    )
}

/// Push a pose event. Unknown codes map to the unknown pose.
///
/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_pose(
    feed: *const MbFeed,
    timestamp_us: u64,
    pose: c_int,
) -> c_int {
    push(
        feed,
        DeviceEvent::Pose {
            timestamp_us,
            pose: Pose::from_code(pose),
        },
    )
}

/// Push an arm-sync event. `arm`: 0 = left, 1 = right, other = unknown.
/// `x_direction`: 0 = toward wrist, 1 = toward elbow. `warmup_state`: 1 = cold, 2 = warm.
///
/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_arm_sync(
    feed: *const MbFeed,
    timestamp_us: u64,
    arm: c_int,
    x_direction: c_int,
    rotation: f64,
    warmup_state: c_int,
) -> c_int {
    push(
        feed,
        DeviceEvent::ArmSync {
            timestamp_us,
            arm: Arm::from_code(arm),
            x_direction: XDirection::from_code(x_direction),
            rotation,
            warmup_state: WarmupState::from_code(warmup_state),
        },
    )
}

/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_arm_unsync(feed: *const MbFeed, timestamp_us: u64) -> c_int {
    push(feed, DeviceEvent::ArmUnsync { timestamp_us })
}

/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_lock(feed: *const MbFeed, timestamp_us: u64) -> c_int {
    push(feed, DeviceEvent::Locked { timestamp_us })
}

/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_unlock(feed: *const MbFeed, timestamp_us: u64) -> c_int {
    push(feed, DeviceEvent::Unlocked { timestamp_us })
}

/// Push a pair event. `name` and `firmware_version` may be NULL.
///
/// # Safety
/// `feed` must be a valid feed pointer, or null. Non-null strings must be
/// null-terminated.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_paired(
    feed: *const MbFeed,
    timestamp_us: u64,
    name: *const c_char,
    firmware_version: *const c_char,
) -> c_int {
    let info = DeviceInfo {
        name: c_str_to_string(name),
        firmware_version: c_str_to_string(firmware_version),
    };
    push(feed, DeviceEvent::Paired { timestamp_us, info })
}

/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_unpaired(feed: *const MbFeed, timestamp_us: u64) -> c_int {
    push(feed, DeviceEvent::Unpaired { timestamp_us })
}

/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_connected(feed: *const MbFeed, timestamp_us: u64) -> c_int {
    push(feed, DeviceEvent::Connected { timestamp_us })
}

/// # Safety
/// `feed` must be a valid feed pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_feed_push_disconnected(
    feed: *const MbFeed,
    timestamp_us: u64,
) -> c_int {
    push(feed, DeviceEvent::Disconnected { timestamp_us })
}

/// Open a session on `feed`, waiting for a paired/connected event.
///
/// `config` may be NULL for defaults. A feed can back only one session.
/// Returns NULL on error (check `mb_last_error()`).
///
/// # Safety
/// `feed` must be a valid feed pointer, or null. `config`, if non-null, must
/// point to a valid `MbConfig`.
#[no_mangle]
pub unsafe extern "C" fn mb_session_open(
    feed: *mut MbFeed,
    config: *const MbConfig,
) -> *mut MbSession {
    if feed.is_null() {
        return std::ptr::null_mut();
    }
    let feed = &mut *feed;
    let config = if config.is_null() {
        SessionConfig::default()
    } else {
        config_from_c(&*config)
    };

    // The backend goes back to the feed on failure so the open can be retried.
    let opened = match feed.backend.take() {
        None => Err(MyoError::BackendTaken),
        Some(mut backend) => match Session::discover(&mut backend, &config) {
            Ok(info) => Ok(Session::with_device(backend, config, info)),
            Err(e) => {
                feed.backend = Some(backend);
                Err(e)
            }
        },
    };

    match report(opened) {
        Some(session) => {
            LAST_ERROR.clear();
            Box::into_raw(Box::new(MbSession(session)))
        }
        None => std::ptr::null_mut(),
    }
}

/// Close a session and free its resources.
///
/// # Safety
/// `session` must be a pointer returned by `mb_session_open`, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_close(session: *mut MbSession) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Process events for `millis` milliseconds.
/// Returns the number of events handled, or -1 on error.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_run(session: *mut MbSession, millis: c_int) -> c_int {
    if session.is_null() {
        return -1;
    }
    let session = &mut *session;
    let duration = Duration::from_millis(millis.max(0) as u64);
    match report(session.0.run(duration)) {
        Some(n) => n.min(c_int::MAX as usize) as c_int,
        None => -1,
    }
}

/// Lock the band. Returns false if no device is attached or the host rejects it.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_lock(session: *mut MbSession) -> bool {
    if session.is_null() {
        return false;
    }
    report((*session).0.lock()).is_some()
}

/// Unlock the band. Returns false if no device is attached or the host rejects it.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_unlock(session: *mut MbSession) -> bool {
    if session.is_null() {
        return false;
    }
    report((*session).0.unlock()).is_some()
}

/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_is_locked(session: *const MbSession) -> bool {
    if session.is_null() {
        return true;
    }
    (*session).0.is_locked()
}

/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_is_on_arm(session: *const MbSession) -> bool {
    if session.is_null() {
        return false;
    }
    (*session).0.is_on_arm()
}

/// Arm the band is worn on: 0 = left, 1 = right, 2 = unknown.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_arm(session: *const MbSession) -> c_int {
    if session.is_null() {
        return Arm::Unknown as c_int;
    }
    (*session).0.state().arm() as c_int
}

/// Current pose code (see `mb_feed_push_pose`).
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_pose(session: *const MbSession) -> c_int {
    if session.is_null() {
        return Pose::Unknown.code();
    }
    (*session).0.state().pose().code()
}

/// Status bitmap (paired, connected, attached, on-arm, unlocked).
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_status(session: *const MbSession) -> u32 {
    if session.is_null() {
        return 0;
    }
    (*session).0.state().status().bits()
}

/// Make the latest raw orientation the zero reference.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_update_reference(session: *const MbSession) {
    if !session.is_null() {
        (*session).0.update_reference();
    }
}

/// Write the current reference-relative angles into `out`.
/// Radians, or degrees when `degrees` is true. Returns 0 on success, -1 on null input.
///
/// # Safety
/// `session` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_orientation(
    session: *const MbSession,
    out: *mut MbEuler,
    degrees: bool,
) -> c_int {
    if session.is_null() || out.is_null() {
        return -1;
    }
    let angles = (*session).0.orientation();
    out.write(convert(angles, degrees));
    0
}

/// Write the reference orientation's own angles into `out`.
///
/// # Safety
/// `session` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn mb_session_reference_orientation(
    session: *const MbSession,
    out: *mut MbEuler,
    degrees: bool,
) -> c_int {
    if session.is_null() || out.is_null() {
        return -1;
    }
    let angles = (*session).0.state().reference_orientation();
    out.write(convert(angles, degrees));
    0
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next myobot API call.
#[no_mangle]
pub extern "C" fn mb_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

fn convert(angles: EulerAngles, degrees: bool) -> MbEuler {
    if degrees {
        angles.to_degrees().into()
    } else {
        angles.into()
    }
}

fn config_from_c(config: &MbConfig) -> SessionConfig {
    let mut out = SessionConfig::default()
        .with_discovery_timeout(Duration::from_millis(config.discovery_timeout_ms as u64))
        .with_invert_angles(config.invert_angles)
        .with_unlock_on_pose(config.unlock_on_pose)
        .with_unlock_type(match config.unlock_type {
            0 => UnlockType::Timed,
            _ => UnlockType::Hold,
        });
    if !config.application_id.is_null() {
        out.application_id = unsafe { c_str_to_string(config.application_id) };
    }
    out
}

unsafe fn c_str_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}
