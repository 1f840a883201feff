// src/backends/mock.rs

//! In-process stand-in for the display library.
//!
//! Behaves like a device whose compositor picks `MockSettings::mode` on
//! connect and then answers update requests following a fixed pattern. The
//! event-ready descriptor is one end of a socket pair, so it can be polled
//! exactly like the real one.

use crate::device::{
    Backend, Buffer, BufferId, DeviceConfig, DeviceError, DeviceEvent, DeviceHandle,
    DeviceStatus, EventHandler, Mode, Rect, UpdateStatus,
};
use crate::logging::LogForwarder;
use log::{debug, trace, warn};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, PoisonError, RwLock};

/// DRM_FORMAT_XRGB8888
pub const XRGB8888: u32 = 0x3432_5258;

#[derive(Debug, Clone)]
pub struct MockSettings {
    /// Status reported for each device index; indices past the end are
    /// `NotPresent`.
    pub statuses: Vec<DeviceStatus>,
    pub fail_open: bool,
    pub fail_add: bool,
    pub reject_connect: bool,
    pub fail_register: bool,
    /// Mode announced after a successful connect.
    pub mode: Mode,
    /// Answers to successive update requests, cycled.
    pub update_pattern: Vec<UpdateStatus>,
    /// Rectangle count each grab reports. May exceed the buffer capacity.
    pub rects_per_grab: i32,
    /// Buffers announced as update-ready right after the mode on connect.
    pub updates_on_connect: Vec<BufferId>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            statuses: vec![DeviceStatus::Unrecognized, DeviceStatus::Available],
            fail_open: false,
            fail_add: false,
            reject_connect: false,
            fail_register: false,
            mode: Mode {
                width: 1280,
                height: 800,
                refresh_rate: 60,
                bits_per_pixel: 32,
                pixel_format: XRGB8888,
            },
            update_pattern: vec![UpdateStatus::Ready, UpdateStatus::Pending],
            rects_per_grab: 1,
            updates_on_connect: Vec::new(),
        }
    }
}

/// The library's process-wide log registration, shared with every handle.
type LogSlot = Arc<RwLock<Option<Arc<LogForwarder>>>>;

fn emit(slot: &LogSlot, args: fmt::Arguments<'_>) {
    let forwarder = slot
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match forwarder {
        Some(forwarder) => forwarder.log(args),
        None => debug!("mock evdi (no sink): {}", args),
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    settings: MockSettings,
    logging: LogSlot,
}

impl MockBackend {
    pub fn new(settings: MockSettings) -> Self {
        Self {
            settings,
            logging: LogSlot::default(),
        }
    }

    pub fn settings(&self) -> &MockSettings {
        &self.settings
    }
}

impl Backend for MockBackend {
    type Handle = MockHandle;

    fn check_device(&self, index: i32) -> DeviceStatus {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.settings.statuses.get(i).copied())
            .unwrap_or(DeviceStatus::NotPresent)
    }

    fn open(&self, index: i32) -> Result<MockHandle, DeviceError> {
        if self.settings.fail_open || self.check_device(index) == DeviceStatus::NotPresent {
            emit(&self.logging, format_args!("Failed to open /dev/dri/card{}", index));
            return Err(DeviceError::OpenFailed(index));
        }
        let handle = MockHandle::new(index, self.settings.clone(), Arc::clone(&self.logging))
            .map_err(DeviceError::Sysfs)?;
        emit(&self.logging, format_args!("Opened /dev/dri/card{}", index));
        Ok(handle)
    }

    fn add_device(&self) -> Result<(), DeviceError> {
        if self.settings.fail_add {
            return Err(DeviceError::AddFailed);
        }
        emit(&self.logging, format_args!("Added new device"));
        Ok(())
    }

    fn set_logging(&self, forwarder: Arc<LogForwarder>) {
        let mut slot = self
            .logging
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(forwarder);
    }
}

/// Counters for what a handle was asked to do.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockStats {
    pub update_requests: usize,
    pub grabs: usize,
    pub events_dispatched: usize,
}

pub struct MockHandle {
    index: i32,
    settings: MockSettings,
    logging: LogSlot,
    connected: Option<DeviceConfig>,
    registered: BTreeSet<BufferId>,
    queued: VecDeque<DeviceEvent>,
    signal_rx: UnixStream,
    signal_tx: UnixStream,
    next_answer: usize,
    frame: u8,
    stats: MockStats,
}

impl fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandle")
            .field("index", &self.index)
            .field("connected", &self.connected.is_some())
            .field("registered", &self.registered)
            .field("queued", &self.queued.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl MockHandle {
    fn new(index: i32, settings: MockSettings, logging: LogSlot) -> io::Result<Self> {
        let (signal_rx, signal_tx) = UnixStream::pair()?;
        signal_rx.set_nonblocking(true)?;
        signal_tx.set_nonblocking(true)?;
        Ok(Self {
            index,
            settings,
            logging,
            connected: None,
            registered: BTreeSet::new(),
            queued: VecDeque::new(),
            signal_rx,
            signal_tx,
            next_answer: 0,
            frame: 0,
            stats: MockStats::default(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    pub fn connected_config(&self) -> Option<&DeviceConfig> {
        self.connected.as_ref()
    }

    pub fn registered_buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.registered.iter().copied()
    }

    pub fn stats(&self) -> MockStats {
        self.stats
    }

    /// Queues an event as if the kernel had produced it.
    ///
    /// An update-ready event for a buffer that already has one queued is
    /// merged into it, the way the library reports one update per buffer.
    pub fn inject_event(&mut self, event: DeviceEvent) {
        if matches!(event, DeviceEvent::UpdateReady(_)) && self.queued.contains(&event) {
            trace!("MockHandle {}: coalescing {:?}", self.index, event);
            return;
        }
        let was_empty = self.queued.is_empty();
        self.queued.push_back(event);
        if was_empty {
            self.signal();
        }
    }

    pub fn queued_events(&self) -> usize {
        self.queued.len()
    }

    // The descriptor stays readable from the first queued event until
    // `handle_events` drains it, so one byte per batch is enough.
    fn signal(&mut self) {
        match self.signal_tx.write(&[1]) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => warn!("MockHandle {}: failed to signal event fd: {}", self.index, err),
        }
    }

    fn drain_signal(&mut self) {
        let mut scratch = [0u8; 64];
        loop {
            match self.signal_rx.read(&mut scratch) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("MockHandle {}: failed to drain event fd: {}", self.index, err);
                    break;
                }
            }
        }
    }

    fn log(&self, args: fmt::Arguments<'_>) {
        emit(&self.logging, args);
    }

    fn paint(&mut self, buffer: &mut Buffer) -> i32 {
        self.frame = self.frame.wrapping_add(1);
        buffer.bytes_mut().fill(self.frame);

        let reported = self.settings.rects_per_grab.max(0);
        let (width, height) = (buffer.width(), buffer.height());
        let storage = buffer.rect_storage_mut();
        let strips = (reported as usize).min(storage.len()).max(1) as i32;
        for (i, rect) in storage.iter_mut().take(reported as usize).enumerate() {
            let i = i as i32;
            *rect = Rect::new(0, i * height / strips, width, (i + 1) * height / strips);
        }
        reported
    }
}

impl DeviceHandle for MockHandle {
    fn connect(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        if self.settings.reject_connect {
            self.log(format_args!("Connect rejected on card{}", self.index));
            return Err(DeviceError::ConnectRejected);
        }
        self.log(format_args!(
            "Connecting card{} with edid of {} bytes, area limit {}",
            self.index,
            config.edid().len(),
            config.sku_area_limit()
        ));
        self.connected = Some(config.clone());
        let mode = self.settings.mode;
        self.inject_event(DeviceEvent::ModeChanged(mode));
        for id in self.settings.updates_on_connect.clone() {
            self.inject_event(DeviceEvent::UpdateReady(id));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected.take().is_some() {
            self.log(format_args!("Disconnected card{}", self.index));
        }
    }

    fn event_ready_fd(&self) -> RawFd {
        self.signal_rx.as_raw_fd()
    }

    fn handle_events(&mut self, handler: &mut dyn EventHandler) {
        self.drain_signal();
        let events: Vec<DeviceEvent> = self.queued.drain(..).collect();
        trace!("MockHandle {}: dispatching {} events", self.index, events.len());
        for event in events {
            self.stats.events_dispatched += 1;
            handler.dispatch(event);
        }
    }

    fn register_buffer(&mut self, buffer: &mut Buffer) -> Result<(), DeviceError> {
        if self.settings.fail_register {
            return Err(DeviceError::BufferRegistrationFailed(buffer.id()));
        }
        self.registered.insert(buffer.id());
        self.log(format_args!(
            "Registered buffer id {} {}x{}",
            buffer.id(),
            buffer.width(),
            buffer.height()
        ));
        Ok(())
    }

    fn unregister_buffer(&mut self, id: BufferId) {
        if self.registered.remove(&id) {
            self.log(format_args!("Unregistered buffer id {}", id));
        }
    }

    fn request_update(&mut self, id: BufferId) -> Result<UpdateStatus, DeviceError> {
        if self.connected.is_none() {
            return Err(DeviceError::NotConnected);
        }
        if !self.registered.contains(&id) {
            return Err(DeviceError::UnknownBuffer(id));
        }
        self.stats.update_requests += 1;

        let answer = if self.settings.update_pattern.is_empty() {
            UpdateStatus::Ready
        } else {
            let answer = self.settings.update_pattern[self.next_answer % self.settings.update_pattern.len()];
            self.next_answer += 1;
            answer
        };

        if answer == UpdateStatus::Pending {
            self.inject_event(DeviceEvent::UpdateReady(id));
        }
        Ok(answer)
    }

    fn grab_pixels(&mut self, buffer: &mut Buffer) -> Result<usize, DeviceError> {
        if self.connected.is_none() {
            return Err(DeviceError::NotConnected);
        }
        if !self.registered.contains(&buffer.id()) {
            trace!("MockHandle {}: grab into unregistered buffer {}", self.index, buffer.id());
        }
        self.stats.grabs += 1;
        let reported = self.paint(buffer);
        Ok(buffer.set_rect_count(reported))
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.disconnect();
        debug!("Closed mock handle for card{}", self.index);
    }
}
