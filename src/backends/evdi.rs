// src/backends/evdi.rs
#![allow(non_camel_case_types)] // C struct mirrors keep their C names

//! Backend over the system libevdi.
//!
//! The `#[repr(C)]` structs below mirror `evdi_lib.h`. Event handlers are
//! plain `extern "C"` functions; the caller's `EventHandler` travels through
//! the library's `user_data` pointer for the duration of one
//! `evdi_handle_events` call.

use crate::device::{
    Backend, Buffer, BufferId, CursorMove, CursorSet, DdcCiData, DeviceConfig, DeviceError,
    DeviceEvent, DeviceHandle, DeviceStatus, EventHandler, Mode, Rect, UpdateStatus,
};
use crate::logging::{ffi as log_ffi, LogForwarder};
use libc::{c_int, c_uchar, c_uint, c_void};
use log::{debug, info, warn};
use std::os::unix::io::RawFd;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, PoisonError};
use std::{fmt, slice};

type evdi_handle = *mut c_void;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct evdi_mode {
    width: c_int,
    height: c_int,
    refresh_rate: c_int,
    bits_per_pixel: c_int,
    pixel_format: c_uint,
}

impl From<evdi_mode> for Mode {
    fn from(raw: evdi_mode) -> Self {
        Mode {
            width: raw.width,
            height: raw.height,
            refresh_rate: raw.refresh_rate,
            bits_per_pixel: raw.bits_per_pixel,
            pixel_format: raw.pixel_format,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
struct evdi_buffer {
    id: c_int,
    buffer: *mut c_void,
    width: c_int,
    height: c_int,
    stride: c_int,
    rects: *mut Rect,
    rect_count: c_int,
}

#[repr(C)]
#[derive(Debug)]
struct evdi_cursor_set {
    hot_x: i32,
    hot_y: i32,
    width: u32,
    height: u32,
    enabled: u8,
    buffer_length: u32,
    buffer: *mut u32,
    pixel_format: u32,
    stride: u32,
}

#[repr(C)]
#[derive(Debug)]
struct evdi_cursor_move {
    x: i32,
    y: i32,
}

#[repr(C)]
#[derive(Debug)]
struct evdi_ddcci_data {
    address: u16,
    flags: u16,
    buffer_length: u32,
    buffer: *mut u8,
}

#[repr(C)]
struct evdi_event_context {
    dpms_handler: Option<extern "C" fn(c_int, *mut c_void)>,
    mode_changed_handler: Option<extern "C" fn(evdi_mode, *mut c_void)>,
    update_ready_handler: Option<extern "C" fn(c_int, *mut c_void)>,
    crtc_state_handler: Option<extern "C" fn(c_int, *mut c_void)>,
    cursor_set_handler: Option<extern "C" fn(evdi_cursor_set, *mut c_void)>,
    cursor_move_handler: Option<extern "C" fn(evdi_cursor_move, *mut c_void)>,
    ddcci_data_handler: Option<extern "C" fn(evdi_ddcci_data, *mut c_void)>,
    user_data: *mut c_void,
}

#[repr(C)]
struct evdi_logging {
    function: Option<log_ffi::RawLogFunction>,
    user_data: *mut c_void,
}

// enum evdi_device_status
const AVAILABLE: c_int = 0;
const UNRECOGNIZED: c_int = 1;

extern "C" {
    fn evdi_check_device(device: c_int) -> c_int;
    fn evdi_open(device: c_int) -> evdi_handle;
    fn evdi_add_device() -> c_int;
    fn evdi_close(handle: evdi_handle);
    fn evdi_connect(
        handle: evdi_handle,
        edid: *const c_uchar,
        edid_length: c_uint,
        sku_area_limit: u32,
    );
    fn evdi_disconnect(handle: evdi_handle);
    fn evdi_grab_pixels(handle: evdi_handle, rects: *mut Rect, num_rects: *mut c_int);
    fn evdi_register_buffer(handle: evdi_handle, buffer: evdi_buffer);
    fn evdi_unregister_buffer(handle: evdi_handle, buffer_id: c_int);
    fn evdi_request_update(handle: evdi_handle, buffer_id: c_int) -> bool;
    fn evdi_handle_events(handle: evdi_handle, evtctx: *mut evdi_event_context);
    fn evdi_get_event_ready(handle: evdi_handle) -> c_int;
    fn evdi_set_logging(evdi_logging: evdi_logging);
}

/// Forwarder currently registered with the library.
///
/// libevdi keeps one logger per process and only stores our raw pointer, so
/// the `Arc` is parked here until a later registration replaces it.
static INSTALLED_FORWARDER: Mutex<Option<Arc<LogForwarder>>> = Mutex::new(None);

#[derive(Debug, Default, Clone, Copy)]
pub struct EvdiBackend;

impl EvdiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for EvdiBackend {
    type Handle = EvdiHandle;

    fn check_device(&self, index: i32) -> DeviceStatus {
        match unsafe { evdi_check_device(index) } {
            AVAILABLE => DeviceStatus::Available,
            UNRECOGNIZED => DeviceStatus::Unrecognized,
            _ => DeviceStatus::NotPresent,
        }
    }

    fn open(&self, index: i32) -> Result<EvdiHandle, DeviceError> {
        let raw = unsafe { evdi_open(index) };
        let raw = NonNull::new(raw).ok_or(DeviceError::OpenFailed(index))?;
        let handle = EvdiHandle {
            raw,
            index,
            connected: false,
        };
        info!("Opened device, got {}", handle);
        Ok(handle)
    }

    fn add_device(&self) -> Result<(), DeviceError> {
        if unsafe { evdi_add_device() } > 0 {
            Ok(())
        } else {
            Err(DeviceError::AddFailed)
        }
    }

    fn set_logging(&self, forwarder: Arc<LogForwarder>) {
        let mut installed = INSTALLED_FORWARDER
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let config = evdi_logging {
            function: Some(log_ffi::trampoline()),
            user_data: Arc::as_ptr(&forwarder) as *mut c_void,
        };
        unsafe { evdi_set_logging(config) };
        // The previous forwarder is released only after the library stopped
        // pointing at it.
        *installed = Some(forwarder);
        debug!("Registered log forwarder with libevdi");
    }
}

pub struct EvdiHandle {
    raw: NonNull<c_void>,
    index: i32,
    connected: bool,
}

impl fmt::Debug for EvdiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvdiHandle")
            .field("raw", &self.raw)
            .field("index", &self.index)
            .field("connected", &self.connected)
            .finish()
    }
}

impl fmt::Display for EvdiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle {:p} for /dev/dri/card{}", self.raw, self.index)
    }
}

impl EvdiHandle {
    fn raw(&self) -> evdi_handle {
        self.raw.as_ptr()
    }
}

impl DeviceHandle for EvdiHandle {
    fn connect(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        let edid = config.edid();
        // libevdi copies the EDID into the kernel during the call.
        unsafe {
            evdi_connect(
                self.raw(),
                edid.as_ptr(),
                edid.len() as c_uint,
                config.sku_area_limit(),
            )
        };
        self.connected = true;
        info!("Connected {}", self);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            unsafe { evdi_disconnect(self.raw()) };
            self.connected = false;
            info!("Disconnected {}", self);
        }
    }

    fn event_ready_fd(&self) -> RawFd {
        unsafe { evdi_get_event_ready(self.raw()) }
    }

    fn handle_events(&mut self, handler: &mut dyn EventHandler) {
        let mut handler: &mut dyn EventHandler = handler;
        let mut context = evdi_event_context {
            dpms_handler: Some(on_dpms),
            mode_changed_handler: Some(on_mode_changed),
            update_ready_handler: Some(on_update_ready),
            crtc_state_handler: Some(on_crtc_state),
            cursor_set_handler: Some(on_cursor_set),
            cursor_move_handler: Some(on_cursor_move),
            ddcci_data_handler: Some(on_ddcci_data),
            user_data: &mut handler as *mut &mut dyn EventHandler as *mut c_void,
        };
        // Handlers only run inside this call, while `handler` is borrowed.
        unsafe { evdi_handle_events(self.raw(), &mut context) };
    }

    fn register_buffer(&mut self, buffer: &mut Buffer) -> Result<(), DeviceError> {
        let (pixels, rects) = buffer.raw_parts();
        let raw = evdi_buffer {
            id: buffer.id(),
            buffer: pixels as *mut c_void,
            width: buffer.width(),
            height: buffer.height(),
            stride: buffer.stride(),
            rects,
            rect_count: 0,
        };
        unsafe { evdi_register_buffer(self.raw(), raw) };
        debug!("Registered buffer {} for {}", buffer.id(), self);
        Ok(())
    }

    fn unregister_buffer(&mut self, id: BufferId) {
        unsafe { evdi_unregister_buffer(self.raw(), id) };
        debug!("Unregistered buffer {} for {}", id, self);
    }

    fn request_update(&mut self, id: BufferId) -> Result<UpdateStatus, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        if unsafe { evdi_request_update(self.raw(), id) } {
            Ok(UpdateStatus::Ready)
        } else {
            Ok(UpdateStatus::Pending)
        }
    }

    fn grab_pixels(&mut self, buffer: &mut Buffer) -> Result<usize, DeviceError> {
        let (_, rects) = buffer.raw_parts();
        let mut count: c_int = 0;
        unsafe { evdi_grab_pixels(self.raw(), rects, &mut count) };
        Ok(buffer.set_rect_count(count))
    }
}

impl Drop for EvdiHandle {
    fn drop(&mut self) {
        self.disconnect();
        unsafe { evdi_close(self.raw()) };
        info!("Closed {}", self);
    }
}

/// Recovers the handler passed through `user_data` and hands it `event`.
fn deliver(user_data: *mut c_void, event: DeviceEvent) {
    if user_data.is_null() {
        warn!("Dropping {:?}: event context without user data", event);
        return;
    }
    // SAFETY: `user_data` was set by `EvdiHandle::handle_events` and is only
    // dereferenced while that call is on the stack.
    let handler = unsafe { &mut *(user_data as *mut &mut dyn EventHandler) };
    handler.dispatch(event);
}

/// Copies `len` elements out of library-owned memory.
///
/// # Safety
///
/// `ptr` is null or valid for `len` reads.
unsafe fn copy_out<T: Copy>(ptr: *const T, len: usize) -> Vec<T> {
    if ptr.is_null() || len == 0 {
        Vec::new()
    } else {
        slice::from_raw_parts(ptr, len).to_vec()
    }
}

extern "C" fn on_dpms(dpms_mode: c_int, user_data: *mut c_void) {
    deliver(user_data, DeviceEvent::Dpms(dpms_mode));
}

extern "C" fn on_mode_changed(mode: evdi_mode, user_data: *mut c_void) {
    deliver(user_data, DeviceEvent::ModeChanged(mode.into()));
}

extern "C" fn on_update_ready(buffer: c_int, user_data: *mut c_void) {
    deliver(user_data, DeviceEvent::UpdateReady(buffer));
}

extern "C" fn on_crtc_state(state: c_int, user_data: *mut c_void) {
    deliver(user_data, DeviceEvent::CrtcState(state));
}

extern "C" fn on_cursor_set(cursor: evdi_cursor_set, user_data: *mut c_void) {
    // buffer_length is in bytes.
    let words = cursor.buffer_length as usize / std::mem::size_of::<u32>();
    let image = unsafe { copy_out(cursor.buffer, words) };
    deliver(
        user_data,
        DeviceEvent::CursorSet(CursorSet {
            hot_x: cursor.hot_x,
            hot_y: cursor.hot_y,
            width: cursor.width,
            height: cursor.height,
            enabled: cursor.enabled != 0,
            pixel_format: cursor.pixel_format,
            stride: cursor.stride,
            image,
        }),
    );
}

extern "C" fn on_cursor_move(cursor: evdi_cursor_move, user_data: *mut c_void) {
    deliver(
        user_data,
        DeviceEvent::CursorMove(CursorMove {
            x: cursor.x,
            y: cursor.y,
        }),
    );
}

extern "C" fn on_ddcci_data(data: evdi_ddcci_data, user_data: *mut c_void) {
    let payload = unsafe { copy_out(data.buffer, data.buffer_length as usize) };
    deliver(
        user_data,
        DeviceEvent::DdcCiData(DdcCiData {
            address: data.address,
            flags: data.flags,
            payload,
        }),
    );
}
