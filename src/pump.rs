use crate::backend::DeviceBackend;
use crate::event::DeviceCommand;
use crate::session::Session;
use crate::state::SessionState;
use crate::types::Quaternion;
use crate::{MyoError, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle to a session running on a background event-pump thread.
///
/// The thread owns the session and backend. Lock/unlock requests are passed
/// to it over a channel; state is read through the shared `SessionState`.
pub struct SessionHandle {
    state: Arc<SessionState>,
    commands: Sender<DeviceCommand>,
    unlock_command: DeviceCommand,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn start<B: DeviceBackend + 'static>(session: Session<B>) -> Result<SessionHandle> {
        let config = session.config().clone();
        let (sender, receiver) = crossbeam_channel::bounded(config.event_queue_capacity);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();
        let state = session.state().clone();

        let thread = std::thread::Builder::new()
            .name("myobot-pump".into())
            .spawn(move || {
                pump_loop(session, receiver, stop_clone);
            })
            .map_err(|e| MyoError::CommandFailed(format!("Failed to spawn pump thread: {}", e)))?;

        Ok(SessionHandle {
            state,
            commands: sender,
            unlock_command: DeviceCommand::Unlock(config.unlock_type),
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Ask the pump thread to lock the band.
    pub fn lock(&self) -> Result<()> {
        self.request(DeviceCommand::Lock)
    }

    /// Ask the pump thread to unlock the band.
    pub fn unlock(&self) -> Result<()> {
        self.request(self.unlock_command)
    }

    fn request(&self, command: DeviceCommand) -> Result<()> {
        if !self.is_active() {
            return Err(MyoError::SessionStopped);
        }
        if !self.state.is_attached() {
            return Err(MyoError::NoDevice);
        }
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => MyoError::QueueFull,
            TrySendError::Disconnected(_) => MyoError::SessionStopped,
        })
    }

    /// Make the most recent raw sample the zero orientation.
    pub fn update_reference(&self) {
        self.state.update_reference();
    }

    pub fn set_reference(&self, reference: Quaternion) {
        self.state.set_reference(reference);
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Check if the pump thread is still running.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
    }

    /// Stop the pump and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs on the pump thread until stopped or the backend disconnects.
///
/// Each iteration drains pending commands, then waits up to `poll_interval`
/// for one event so the stop flag is checked regularly.
fn pump_loop<B: DeviceBackend>(
    mut session: Session<B>,
    commands: Receiver<DeviceCommand>,
    stop_flag: Arc<AtomicBool>,
) {
    let poll_interval = session.config().poll_interval;
    log::info!("Event pump started");

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("Event pump stopping (stop flag set)");
            break;
        }

        for command in commands.try_iter() {
            if let Err(e) = session.command(command) {
                log::warn!("{:?} failed: {}", command, e);
            }
        }

        match session.run_once(poll_interval) {
            Ok(_) => {}
            Err(MyoError::ChannelDisconnected) => {
                log::info!("Event source disconnected, stopping pump");
                break;
            }
            Err(e) => {
                log::warn!("Event poll error: {}", e);
                std::thread::sleep(poll_interval);
            }
        }
    }

    stop_flag.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::channel_backend;
    use crate::config::SessionConfig;
    use crate::event::DeviceEvent;
    use crate::types::{DeviceInfo, Pose, UnlockType};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_background_pump_end_to_end() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = sent.clone();
        let (feed, backend) = channel_backend(
            64,
            Box::new(move |cmd| {
                log.lock().unwrap().push(cmd);
                Ok(())
            }),
        );
        feed.push(DeviceEvent::Paired {
            timestamp_us: 0,
            info: DeviceInfo::default(),
        })
        .unwrap();

        let config = SessionConfig::default()
            .with_poll_interval(Duration::from_millis(5))
            .with_unlock_on_pose(false);
        let session = Session::initialize(backend, config).unwrap();
        let handle = session.spawn().unwrap();
        assert!(handle.is_active());

        // Vendor callback thread.
        let producer = std::thread::spawn(move || {
            feed.push_pose(1, Pose::FingersSpread).unwrap();
            feed.push_orientation(2, Quaternion::from_axis_angle([0.0, 0.0, 1.0], 0.5))
                .unwrap();
            feed
        });
        let feed = producer.join().unwrap();

        assert!(wait_until(|| handle.state().last_timestamp_us() == Some(2)));
        assert_eq!(handle.state().pose(), Pose::FingersSpread);
        assert!((handle.state().orientation().yaw - 0.5).abs() < 1e-9);

        handle.update_reference();
        assert!(handle.state().reference_orientation().yaw > 0.49);

        handle.lock().unwrap();
        handle.unlock().unwrap();
        assert!(wait_until(|| sent.lock().unwrap().len() == 2));
        assert_eq!(
            *sent.lock().unwrap(),
            vec![DeviceCommand::Lock, DeviceCommand::Unlock(UnlockType::Hold)]
        );

        drop(feed);
        assert!(wait_until(|| !handle.is_active()));
        assert!(matches!(handle.lock(), Err(MyoError::SessionStopped)));
    }

    #[test]
    fn test_stop_joins_thread() {
        let (feed, backend) = channel_backend(8, Box::new(|_| Ok(())));
        feed.push(DeviceEvent::Connected { timestamp_us: 0 }).unwrap();
        let config = SessionConfig::default().with_poll_interval(Duration::from_millis(5));
        let handle = Session::initialize(backend, config).unwrap().spawn().unwrap();

        let state = handle.state().clone();
        let start = Instant::now();
        handle.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(state.is_active());
        drop(feed);
    }
}
