use crate::types::UnlockType;
use crate::{MyoError, Result};
use std::time::Duration;

/// Identifier used when none is configured.
pub const DEFAULT_APPLICATION_ID: &str = "org.myobot.bridge";

/// How long `Session::initialize` waits for a device by default.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(10_000);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

const MAX_APPLICATION_ID_LEN: usize = 255;

/// Session settings. Everything here is fixed once the session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Reverse-domain identifier handed to the device hub.
    pub application_id: String,
    pub discovery_timeout: Duration,
    /// Negate all Euler angles (band worn with +x toward the elbow).
    pub invert_angles: bool,
    /// Re-issue an unlock on every pose event.
    pub unlock_on_pose: bool,
    pub unlock_type: UnlockType,
    /// Upper bound on a single backend poll, and on stop latency of the pump thread.
    pub poll_interval: Duration,
    pub event_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            invert_angles: false,
            unlock_on_pose: true,
            unlock_type: UnlockType::Hold,
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `MYOBOT_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            application_id: read_env_string("MYOBOT_APP_ID", &defaults.application_id),
            discovery_timeout: Duration::from_millis(read_env_u64(
                "MYOBOT_DISCOVERY_TIMEOUT_MS",
                defaults.discovery_timeout.as_millis() as u64,
            )),
            invert_angles: read_env_bool("MYOBOT_INVERT_ANGLES", defaults.invert_angles),
            unlock_on_pose: read_env_bool("MYOBOT_UNLOCK_ON_POSE", defaults.unlock_on_pose),
            poll_interval: Duration::from_millis(read_env_u64(
                "MYOBOT_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            ..defaults
        }
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_invert_angles(mut self, invert: bool) -> Self {
        self.invert_angles = invert;
        self
    }

    pub fn with_unlock_on_pose(mut self, enabled: bool) -> Self {
        self.unlock_on_pose = enabled;
        self
    }

    pub fn with_unlock_type(mut self, unlock_type: UnlockType) -> Self {
        self.unlock_type = unlock_type;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_application_id(&self.application_id)?;
        if self.poll_interval.is_zero() {
            return Err(MyoError::InvalidConfig("poll_interval must be non-zero".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(MyoError::InvalidConfig(
                "event_queue_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Check an application identifier against the hub's naming rule.
///
/// Empty is allowed. Otherwise: at most 255 chars, three or more `.`-separated
/// segments of `[A-Za-z0-9_-]`, no segment starting or ending with `-`/`_`,
/// and no `-`/`_` anywhere in the top-level (first) segment.
pub fn validate_application_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Ok(());
    }
    let invalid = || MyoError::InvalidApplicationId(id.to_string());

    if id.len() > MAX_APPLICATION_ID_LEN {
        return Err(invalid());
    }

    let segments: Vec<&str> = id.split('.').collect();
    if segments.len() < 3 {
        return Err(invalid());
    }

    for (i, segment) in segments.iter().enumerate() {
        let bytes = segment.as_bytes();
        let (first, last) = match (bytes.first(), bytes.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(invalid()),
        };
        let punct = |b: u8| b == b'-' || b == b'_';
        if punct(first) || punct(last) {
            return Err(invalid());
        }
        if !bytes.iter().all(|&b| b.is_ascii_alphanumeric() || punct(b)) {
            return Err(invalid());
        }
        if i == 0 && bytes.iter().any(|&b| punct(b)) {
            return Err(invalid());
        }
    }
    Ok(())
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| {
            let v = v.trim().to_ascii_lowercase();
            match v.as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            }
        })
        .unwrap_or(default)
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.discovery_timeout, Duration::from_secs(10));
        assert!(config.unlock_on_pose);
        assert!(!config.invert_angles);
    }

    #[test]
    fn test_application_id_rules() {
        for ok in [
            "",
            "com.example.hello-world",
            "org.usfirst.frc.team6135.MyoBot",
            "com.example.my_app",
        ] {
            assert!(validate_application_id(ok).is_ok(), "{ok:?} should pass");
        }
        for bad in [
            "com.example",
            "com..example",
            "com.example.-app",
            "com.example.app_",
            "c-m.example.app",
            "com.exa mple.app",
            "com.example.app.",
        ] {
            assert!(
                matches!(
                    validate_application_id(bad),
                    Err(MyoError::InvalidApplicationId(_))
                ),
                "{bad:?} should fail"
            );
        }
        let long = format!("com.example.{}", "a".repeat(250));
        assert!(validate_application_id(&long).is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = SessionConfig::default().with_poll_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(MyoError::InvalidConfig(_))));

        let config = SessionConfig::default().with_event_queue_capacity(0);
        assert!(matches!(config.validate(), Err(MyoError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_setters() {
        let config = SessionConfig::new("com.example.app")
            .with_invert_angles(true)
            .with_unlock_on_pose(false)
            .with_unlock_type(UnlockType::Timed)
            .with_discovery_timeout(Duration::from_millis(50));
        assert_eq!(config.application_id, "com.example.app");
        assert!(config.invert_angles);
        assert!(!config.unlock_on_pose);
        assert_eq!(config.unlock_type, UnlockType::Timed);
        assert_eq!(config.discovery_timeout, Duration::from_millis(50));
    }
}
