use crate::backend::DeviceBackend;
use crate::config::SessionConfig;
use crate::event::{dispatch, DeviceCommand, DeviceEvent, DeviceListener};
use crate::pump::SessionHandle;
use crate::state::SessionState;
use crate::types::{DeviceInfo, EulerAngles};
use crate::{MyoError, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A connected armband.
///
/// Owns the backend, folds its events into a shared `SessionState`, and
/// forwards lock/unlock commands. Events are only processed while `run` (or
/// the thread started by `spawn`) is pumping.
pub struct Session<B: DeviceBackend> {
    backend: B,
    config: SessionConfig,
    state: Arc<SessionState>,
    listeners: Vec<Box<dyn DeviceListener>>,
    subscribers: Vec<Sender<DeviceEvent>>,
}

impl<B: DeviceBackend> Session<B> {
    /// Wait for a device on `backend` and start a session on it.
    ///
    /// Fails with `DeviceNotFound` if nothing shows up within
    /// `config.discovery_timeout`.
    pub fn initialize(mut backend: B, config: SessionConfig) -> Result<Session<B>> {
        let info = Self::discover(&mut backend, &config)?;
        Ok(Self::with_device(backend, config, info))
    }

    /// Validate `config` and wait for a device without taking ownership of
    /// `backend`, so a caller can retry after a timeout.
    pub(crate) fn discover(backend: &mut B, config: &SessionConfig) -> Result<DeviceInfo> {
        config.validate()?;
        backend
            .wait_for_device(config.discovery_timeout)?
            .ok_or(MyoError::DeviceNotFound {
                timeout_ms: config.discovery_timeout.as_millis() as u64,
            })
    }

    pub(crate) fn with_device(backend: B, config: SessionConfig, info: DeviceInfo) -> Session<B> {
        log::info!(
            "Session started: app={:?} device={:?} firmware={} invert_angles={}",
            config.application_id,
            info.name,
            info.firmware_version,
            config.invert_angles
        );

        let state = Arc::new(SessionState::new(config.invert_angles));
        state.mark_paired(info);

        Session {
            backend,
            config,
            state,
            listeners: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Pump events for `duration`. Returns how many events were handled.
    ///
    /// The backend is polled at least once, in slices no longer than
    /// `poll_interval`. A duration too large to represent as a deadline runs
    /// until the backend returns an error.
    pub fn run(&mut self, duration: Duration) -> Result<usize> {
        let deadline = Instant::now().checked_add(duration);
        let mut processed = 0;
        loop {
            let slice = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(self.config.poll_interval),
                None => self.config.poll_interval,
            };
            if self.run_once(slice)? {
                processed += 1;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
        }
        Ok(processed)
    }

    /// Handle at most one event, waiting up to `timeout` for it.
    pub fn run_once(&mut self, timeout: Duration) -> Result<bool> {
        match self.backend.poll_event(timeout)? {
            Some(event) => {
                self.handle_event(event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn handle_event(&mut self, event: DeviceEvent) {
        match &event {
            DeviceEvent::Orientation(sample) => {
                log::trace!("orientation sample at {} us", sample.timestamp_us)
            }
            other => log::debug!("{} event at {} us", other.kind(), other.timestamp_us()),
        }

        self.state.apply(&event);

        if matches!(event, DeviceEvent::Pose { .. }) && self.config.unlock_on_pose {
            // Keep the band unlocked while poses are being performed.
            if let Err(e) = self
                .backend
                .send_command(DeviceCommand::Unlock(self.config.unlock_type))
            {
                log::warn!("Unlock after pose failed: {}", e);
            }
        }

        for listener in self.listeners.iter_mut() {
            dispatch(listener.as_mut(), &event);
        }

        self.subscribers
            .retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::trace!("Subscriber queue full, dropping {} event", event.kind());
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Lock the band. Requires an attached device.
    pub fn lock(&mut self) -> Result<()> {
        self.command(DeviceCommand::Lock)
    }

    /// Unlock the band using the configured unlock type. Requires an attached device.
    pub fn unlock(&mut self) -> Result<()> {
        self.command(DeviceCommand::Unlock(self.config.unlock_type))
    }

    pub(crate) fn command(&mut self, command: DeviceCommand) -> Result<()> {
        if !self.state.is_attached() {
            return Err(MyoError::NoDevice);
        }
        self.backend.send_command(command)
    }

    /// Make the most recent raw sample the zero orientation.
    pub fn update_reference(&self) {
        self.state.update_reference();
    }

    /// Latest reference-relative roll/pitch/yaw, radians.
    pub fn orientation(&self) -> EulerAngles {
        self.state.orientation()
    }

    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    pub fn is_on_arm(&self) -> bool {
        self.state.is_on_arm()
    }

    /// Shared state, readable from other threads.
    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register a listener; it sees every event after the session state does.
    pub fn add_listener(&mut self, listener: Box<dyn DeviceListener>) {
        self.listeners.push(listener);
    }

    /// Receive a copy of every event. Events are dropped while the receiver is full.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<DeviceEvent> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.subscribers.push(tx);
        rx
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: DeviceBackend + 'static> Session<B> {
    /// Move the session onto a background thread that pumps events until stopped.
    pub fn spawn(self) -> Result<SessionHandle> {
        SessionHandle::start(self)
    }
}
