// src/device/types.rs

//! Plain data exchanged with the display library.
//!
//! These are the Rust-side values; the `#[repr(C)]` mirrors used at the FFI
//! boundary live in the evdi backend and convert into these.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a frame buffer registered on a handle.
pub type BufferId = i32;

/// Result of probing a device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// The node was created by the kernel module and can be opened.
    Available,
    /// The node exists but was not created by the kernel module.
    Unrecognized,
    /// The node does not exist or could not be inspected.
    NotPresent,
}

/// A dirty rectangle, corners inclusive top-left and exclusive bottom-right.
///
/// Layout matches `struct evdi_rect`, so buffer rectangle storage is handed
/// to the library as is.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width(),
            self.height(),
            self.x1,
            self.y1
        )
    }
}

/// Display mode chosen by the compositor for the virtual output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub width: i32,
    pub height: i32,
    pub refresh_rate: i32,
    pub bits_per_pixel: i32,
    /// DRM fourcc code.
    pub pixel_format: u32,
}

impl Mode {
    pub fn bytes_per_pixel(&self) -> i32 {
        self.bits_per_pixel / 8
    }

    pub fn stride(&self) -> i32 {
        self.bytes_per_pixel() * self.width
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{}Hz {}bpp",
            self.width, self.height, self.refresh_rate, self.bits_per_pixel
        )
    }
}

/// Answer of a synchronous update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The update is available now; grab pixels immediately.
    Ready,
    /// Not yet ready; an update-ready event will follow.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSet {
    pub hot_x: i32,
    pub hot_y: i32,
    pub width: u32,
    pub height: u32,
    pub enabled: bool,
    pub pixel_format: u32,
    pub stride: u32,
    /// Copy of the cursor image, `buffer_length` bytes in the library.
    pub image: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorMove {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdcCiData {
    pub address: u16,
    pub flags: u16,
    pub payload: Vec<u8>,
}

/// Events the library dispatches from `handle_events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Dpms(i32),
    ModeChanged(Mode),
    UpdateReady(BufferId),
    CrtcState(i32),
    CursorSet(CursorSet),
    CursorMove(CursorMove),
    DdcCiData(DdcCiData),
}

/// Receiver of dispatched events. Every method defaults to doing nothing so
/// implementors only pick the kinds they care about.
pub trait EventHandler {
    fn dpms(&mut self, _mode: i32) {}
    fn mode_changed(&mut self, _mode: Mode) {}
    fn update_ready(&mut self, _buffer: BufferId) {}
    fn crtc_state(&mut self, _state: i32) {}
    fn cursor_set(&mut self, _cursor: CursorSet) {}
    fn cursor_move(&mut self, _cursor: CursorMove) {}
    fn ddcci_data(&mut self, _data: DdcCiData) {}

    /// Routes an owned event to the matching method.
    fn dispatch(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Dpms(mode) => self.dpms(mode),
            DeviceEvent::ModeChanged(mode) => self.mode_changed(mode),
            DeviceEvent::UpdateReady(buffer) => self.update_ready(buffer),
            DeviceEvent::CrtcState(state) => self.crtc_state(state),
            DeviceEvent::CursorSet(cursor) => self.cursor_set(cursor),
            DeviceEvent::CursorMove(cursor) => self.cursor_move(cursor),
            DeviceEvent::DdcCiData(data) => self.ddcci_data(data),
        }
    }
}

/// Collects every event it receives. Handy when the caller wants to act on
/// events after `handle_events` returns.
#[derive(Debug, Default)]
pub struct EventQueue {
    pub events: Vec<DeviceEvent>,
}

impl EventHandler for EventQueue {
    fn dispatch(&mut self, event: DeviceEvent) {
        self.events.push(event);
    }
}
