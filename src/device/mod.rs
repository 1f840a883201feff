// src/device/mod.rs
//
// Typed view of the display library's device API. Backends implement the two
// traits below; everything above them (session, sample client) is written
// against the traits only.

pub mod buffer;
pub mod error;
pub mod sysfs;
pub mod types;

pub use buffer::{Buffer, MAX_DIRTY_RECTS};
pub use error::{DeviceError, RemoveError, Severity};
pub use types::{
    BufferId, CursorMove, CursorSet, DdcCiData, DeviceEvent, DeviceStatus, EventHandler,
    EventQueue, Mode, Rect, UpdateStatus,
};

use crate::logging::LogForwarder;
use std::fmt;
use std::os::unix::io::RawFd;
use std::sync::Arc;

/// SKU area limit of a 1920x1080 output.
pub const DEFAULT_SKU_AREA_LIMIT: u32 = 1920 * 1080;

/// 128-byte EDID of a generic "Linux SVGA" monitor, used by the sample client.
pub const SAMPLE_EDID: [u8; 128] = [
    0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x31, 0xd8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x05, 0x16, 0x01, 0x03, 0x6d, 0x1b, 0x14, 0x78, 0xea, 0x5e, 0xc0, 0xa4, 0x59, 0x4a, 0x98, 0x25,
    0x20, 0x50, 0x54, 0x01, 0x00, 0x00, 0x45, 0x40, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0xa0, 0x0f, 0x20, 0x00, 0x31, 0x58, 0x1c, 0x20, 0x28, 0x80,
    0x14, 0x00, 0x15, 0xd0, 0x10, 0x00, 0x00, 0x1e, 0x00, 0x00, 0x00, 0xff, 0x00, 0x4c, 0x69, 0x6e,
    0x75, 0x78, 0x20, 0x23, 0x30, 0x0a, 0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0x00, 0xfd, 0x00, 0x3b,
    0x3d, 0x24, 0x26, 0x05, 0x00, 0x0a, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0x00, 0xfc,
    0x00, 0x4c, 0x69, 0x6e, 0x75, 0x78, 0x20, 0x53, 0x56, 0x47, 0x41, 0x0a, 0x20, 0x20, 0x00, 0xc2,
];

/// Describes the virtual monitor presented at connect time.
///
/// The EDID is passed through untouched; nothing here parses it.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    edid: Vec<u8>,
    sku_area_limit: u32,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("edid_len", &self.edid.len())
            .field("sku_area_limit", &self.sku_area_limit)
            .finish()
    }
}

impl DeviceConfig {
    pub fn new<B: AsRef<[u8]>>(edid: B, sku_area_limit: u32) -> Self {
        Self {
            edid: edid.as_ref().to_owned(),
            sku_area_limit,
        }
    }

    /// Area limit derived from the largest resolution the monitor may use.
    /// Saturates at `u32::MAX` for resolutions past the representable area.
    pub fn for_resolution<B: AsRef<[u8]>>(edid: B, width: u32, height: u32) -> Self {
        Self::new(edid, width.saturating_mul(height))
    }

    pub fn sample() -> Self {
        Self::new(SAMPLE_EDID, DEFAULT_SKU_AREA_LIMIT)
    }

    pub fn edid(&self) -> &[u8] {
        &self.edid
    }

    pub fn sku_area_limit(&self) -> u32 {
        self.sku_area_limit
    }
}

/// An opened virtual display instance. Dropping it closes the handle.
pub trait DeviceHandle {
    /// Presents the monitor described by `config` to the system.
    fn connect(&mut self, config: &DeviceConfig) -> Result<(), DeviceError>;

    fn disconnect(&mut self);

    /// Descriptor that becomes readable when events are pending.
    fn event_ready_fd(&self) -> RawFd;

    /// Dispatches every pending event to `handler`, synchronously.
    fn handle_events(&mut self, handler: &mut dyn EventHandler);

    /// Makes `buffer` a target for updates. The buffer must stay at the same
    /// address until it is unregistered.
    fn register_buffer(&mut self, buffer: &mut Buffer) -> Result<(), DeviceError>;

    fn unregister_buffer(&mut self, id: BufferId);

    fn request_update(&mut self, id: BufferId) -> Result<UpdateStatus, DeviceError>;

    /// Copies the pending update into `buffer` and returns the number of
    /// valid dirty rectangles, already clamped to the buffer's capacity.
    fn grab_pixels(&mut self, buffer: &mut Buffer) -> Result<usize, DeviceError>;
}

/// Entry point of a display library implementation.
pub trait Backend {
    type Handle: DeviceHandle;

    fn check_device(&self, index: i32) -> DeviceStatus;

    fn open(&self, index: i32) -> Result<Self::Handle, DeviceError>;

    /// Asks the kernel module for one more device node.
    fn add_device(&self) -> Result<(), DeviceError>;

    /// Registers `forwarder` as the library's log sink, replacing any
    /// previous registration.
    fn set_logging(&self, forwarder: Arc<LogForwarder>);
}
