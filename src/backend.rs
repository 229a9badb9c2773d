//! The seam to the vendor device layer, plus a channel-fed implementation.

use crate::event::{DeviceCommand, DeviceEvent};
use crate::types::{DeviceInfo, OrientationSample, Pose, Quaternion};
use crate::{MyoError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::{Duration, Instant};

/// The external device layer a session runs on top of.
///
/// Discovery, transport and event production live behind this trait.
pub trait DeviceBackend: Send {
    /// Block until a device is available or `timeout` passes (`Ok(None)`).
    fn wait_for_device(&mut self, timeout: Duration) -> Result<Option<DeviceInfo>>;

    /// Next event, or `Ok(None)` if nothing arrived within `timeout`.
    fn poll_event(&mut self, timeout: Duration) -> Result<Option<DeviceEvent>>;

    fn send_command(&mut self, command: DeviceCommand) -> Result<()>;
}

impl<B: DeviceBackend + ?Sized> DeviceBackend for Box<B> {
    fn wait_for_device(&mut self, timeout: Duration) -> Result<Option<DeviceInfo>> {
        (**self).wait_for_device(timeout)
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<DeviceEvent>> {
        (**self).poll_event(timeout)
    }

    fn send_command(&mut self, command: DeviceCommand) -> Result<()> {
        (**self).send_command(command)
    }
}

/// Destination for commands issued by a `ChannelBackend`.
pub type CommandSink = Box<dyn FnMut(DeviceCommand) -> Result<()> + Send>;

/// Create a host-fed backend.
///
/// The returned `EventFeed` is cloned into whatever thread receives vendor
/// callbacks; the `ChannelBackend` goes to the session. Commands are handed
/// to `commands`.
pub fn channel_backend(capacity: usize, commands: CommandSink) -> (EventFeed, ChannelBackend) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity);
    (
        EventFeed { sender },
        ChannelBackend {
            receiver,
            commands,
        },
    )
}

/// Sending half of a channel backend.
#[derive(Clone)]
pub struct EventFeed {
    sender: Sender<DeviceEvent>,
}

impl EventFeed {
    /// Queue an event without blocking.
    pub fn push(&self, event: DeviceEvent) -> Result<()> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => {
                log::trace!("Event queue full, dropping {} event", event.kind());
                MyoError::QueueFull
            }
            TrySendError::Disconnected(_) => MyoError::ChannelDisconnected,
        })
    }

    pub fn push_orientation(&self, timestamp_us: u64, quaternion: Quaternion) -> Result<()> {
        self.push(DeviceEvent::Orientation(OrientationSample {
            timestamp_us,
            quaternion,
        }))
    }

    pub fn push_pose(&self, timestamp_us: u64, pose: Pose) -> Result<()> {
        self.push(DeviceEvent::Pose { timestamp_us, pose })
    }

    /// Number of events waiting to be consumed.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

/// Backend fed through an `EventFeed`.
pub struct ChannelBackend {
    receiver: Receiver<DeviceEvent>,
    commands: CommandSink,
}

impl DeviceBackend for ChannelBackend {
    /// Waits for a `Paired` or `Connected` event; anything earlier is discarded.
    fn wait_for_device(&mut self, timeout: Duration) -> Result<Option<DeviceInfo>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(DeviceEvent::Paired { info, .. }) => return Ok(Some(info)),
                Ok(DeviceEvent::Connected { .. }) => return Ok(Some(DeviceInfo::default())),
                Ok(other) => {
                    log::trace!("Discarding {} event before pairing", other.kind());
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(MyoError::ChannelDisconnected),
            }
        }
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<DeviceEvent>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(MyoError::ChannelDisconnected),
        }
    }

    fn send_command(&mut self, command: DeviceCommand) -> Result<()> {
        (self.commands)(command)
    }
}
