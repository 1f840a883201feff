// src/session.rs

//! `Session` owns one opened device handle together with the buffers
//! registered on it.
//!
//! The handle traits are thin mirrors of the library calls. The session adds
//! the bookkeeping the library leaves to its caller: it refuses operations
//! that need a connection before `connect`, tells an unknown buffer id apart
//! from an update that is merely pending, keeps buffers pinned in memory
//! while the library points at them, and unregisters them before the handle
//! is closed.

use crate::device::{
    Buffer, BufferId, DeviceConfig, DeviceError, DeviceEvent, DeviceHandle, EventHandler,
    EventQueue, Mode, Rect, UpdateStatus,
};
use crate::os::poll::wait_readable;
use log::{debug, info, trace};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub struct Session<H: DeviceHandle> {
    handle: H,
    connected: bool,
    // Boxed so a buffer keeps its address while the map rebalances.
    buffers: BTreeMap<BufferId, Box<Buffer>>,
}

impl<H: DeviceHandle> Session<H> {
    pub fn new(handle: H) -> Self {
        Self {
            handle,
            connected: false,
            buffers: BTreeMap::new(),
        }
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connect(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        self.handle.connect(config)?;
        self.connected = true;
        info!("Session connected with {:?}", config);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.connected {
            self.handle.disconnect();
            self.connected = false;
        }
    }

    fn ensure_connected(&self) -> Result<(), DeviceError> {
        if self.connected {
            Ok(())
        } else {
            Err(DeviceError::NotConnected)
        }
    }

    /// Waits for the event-ready descriptor. `None` waits forever.
    ///
    /// Returns `false` when the timeout expired without events.
    pub fn poll_ready(&self, timeout: Option<Duration>) -> Result<bool, DeviceError> {
        self.ensure_connected()?;
        wait_readable(self.handle.event_ready_fd(), timeout).map_err(DeviceError::Poll)
    }

    /// Dispatches one batch of pending events.
    pub fn handle_events(&mut self, handler: &mut dyn EventHandler) -> Result<(), DeviceError> {
        self.ensure_connected()?;
        self.handle.handle_events(handler);
        Ok(())
    }

    /// Polls and dispatches until the compositor announces a mode.
    ///
    /// Every other event that arrives meanwhile, earlier mode changes of the
    /// same batch included, is returned alongside the newest mode so the
    /// caller does not lose it.
    pub fn wait_for_mode(
        &mut self,
        timeout: Duration,
    ) -> Result<(Mode, Vec<DeviceEvent>), DeviceError> {
        let deadline = Instant::now() + timeout;
        let mut others = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !self.poll_ready(Some(remaining))? {
                return Err(DeviceError::Timeout);
            }

            let mut queue = EventQueue::default();
            self.handle_events(&mut queue)?;

            let mut mode = None;
            for event in queue.events {
                match event {
                    DeviceEvent::ModeChanged(m) => {
                        if let Some(earlier) = mode.replace(m) {
                            others.push(DeviceEvent::ModeChanged(earlier));
                        }
                    }
                    other => others.push(other),
                }
            }
            if let Some(mode) = mode {
                info!("Got mode {}", mode);
                return Ok((mode, others));
            }
            trace!("No mode yet, {} other events so far", others.len());
        }
    }

    pub fn register_buffer(&mut self, buffer: Buffer) -> Result<BufferId, DeviceError> {
        let id = buffer.id();
        if self.buffers.contains_key(&id) {
            return Err(DeviceError::BufferAlreadyRegistered(id));
        }
        let mut buffer = Box::new(buffer);
        self.handle.register_buffer(&mut buffer)?;
        self.buffers.insert(id, buffer);
        debug!("Registered buffer {}", id);
        Ok(id)
    }

    /// Unregisters and returns the buffer.
    pub fn unregister_buffer(&mut self, id: BufferId) -> Result<Buffer, DeviceError> {
        let buffer = self
            .buffers
            .remove(&id)
            .ok_or(DeviceError::UnknownBuffer(id))?;
        self.handle.unregister_buffer(id);
        debug!("Unregistered buffer {}", id);
        Ok(*buffer)
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(&id).map(|b| b.as_ref())
    }

    pub fn buffer_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.buffers.keys().copied()
    }

    /// Asks for an update into buffer `id`.
    ///
    /// `Ok(Pending)` means an update-ready event will follow; an id that was
    /// never registered is `Err(UnknownBuffer)`.
    pub fn request_update(&mut self, id: BufferId) -> Result<UpdateStatus, DeviceError> {
        self.ensure_connected()?;
        if !self.buffers.contains_key(&id) {
            return Err(DeviceError::UnknownBuffer(id));
        }
        self.handle.request_update(id)
    }

    /// Copies the update into buffer `id` and returns its dirty rectangles.
    pub fn grab_pixels(&mut self, id: BufferId) -> Result<&[Rect], DeviceError> {
        self.ensure_connected()?;
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(DeviceError::UnknownBuffer(id))?;
        self.handle.grab_pixels(buffer)?;
        Ok(buffer.rects())
    }

    /// Grabs the pending update into `scratch`, a buffer the session does
    /// not own and the library never registered. Only the rectangles are
    /// meaningful; pixels land only if `scratch` has room for them.
    pub fn grab_into<'b>(
        &mut self,
        scratch: &'b mut Buffer,
    ) -> Result<&'b [Rect], DeviceError> {
        self.ensure_connected()?;
        self.handle.grab_pixels(scratch)?;
        Ok(scratch.rects())
    }
}

impl<H: DeviceHandle> Drop for Session<H> {
    fn drop(&mut self) {
        let ids: Vec<BufferId> = self.buffers.keys().copied().collect();
        for id in ids {
            self.handle.unregister_buffer(id);
        }
        self.buffers.clear();
        self.disconnect();
    }
}

#[cfg(test)]
mod tests;
