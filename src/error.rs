use std::fmt;

/// Errors that can occur while running an armband session.
#[derive(Debug, thiserror::Error)]
pub enum MyoError {
    #[error("Device not found within {timeout_ms} ms")]
    DeviceNotFound { timeout_ms: u64 },

    #[error("No device attached to the session")]
    NoDevice,

    #[error("Invalid application identifier: {0:?}")]
    InvalidApplicationId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Device command failed: {0}")]
    CommandFailed(String),

    #[error("Event queue full")]
    QueueFull,

    #[error("Channel disconnected")]
    ChannelDisconnected,

    #[error("Session stopped")]
    SessionStopped,

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Backend already handed to a session")]
    BackendTaken,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &MyoError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
