// src/logging.rs

//! Forwarding of the display library's internal log output.
//!
//! The library knows a single process-wide log sink. `LogForwarder` is the
//! object registered as that sink: it owns the user callback, formats
//! messages into a bounded buffer of `LOG_MESSAGE_CAPACITY` bytes (the last
//! byte is reserved for the C terminator, as in the library's own buffers)
//! and decides what happens when a message arrives before any callback was
//! installed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Size of the formatting buffer, terminator included.
pub const LOG_MESSAGE_CAPACITY: usize = 5000;

/// Longest message, in bytes, a callback can receive.
pub const MAX_LOG_MESSAGE_LEN: usize = LOG_MESSAGE_CAPACITY - 1;

/// Sent in place of a message whose `Display` implementation failed.
pub const FORMAT_FALLBACK_MESSAGE: &str = "failed to format log message";

/// Target used by [`log_to_logger`].
pub const LIBRARY_LOG_TARGET: &str = "evdi";

/// User callback receiving fully formatted messages.
///
/// The library may log from any of its internal contexts, so the callback
/// has to be callable from any thread.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// What the forwarder does with a message when no callback is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCallback {
    /// Print a diagnostic to stderr and exit the process with status 1.
    #[default]
    Terminate,
    /// Drop the message silently.
    Discard,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LogError {
    #[error("log callback not set")]
    NoCallback,
    #[error("failed to format log message")]
    Format,
}

pub struct LogForwarder {
    callback: RwLock<Option<LogCallback>>,
    on_missing: MissingCallback,
}

impl fmt::Debug for LogForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogForwarder")
            .field("has_callback", &self.has_callback())
            .field("on_missing", &self.on_missing)
            .finish()
    }
}

impl Default for LogForwarder {
    fn default() -> Self {
        Self::new(MissingCallback::default())
    }
}

impl LogForwarder {
    /// Creates a forwarder with no callback yet.
    pub fn new(on_missing: MissingCallback) -> Self {
        Self {
            callback: RwLock::new(None),
            on_missing,
        }
    }

    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let forwarder = Self::default();
        forwarder.set_callback(callback);
        forwarder
    }

    /// Installs `callback`, replacing any previous one.
    ///
    /// Returns `true` when a callback was replaced.
    pub fn set_callback<F>(&self, callback: F) -> bool
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut slot = self
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        slot.replace(Box::new(callback)).is_some()
    }

    pub fn has_callback(&self) -> bool {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn on_missing(&self) -> MissingCallback {
        self.on_missing
    }

    /// Hands an already formatted message to the callback.
    ///
    /// Messages longer than `MAX_LOG_MESSAGE_LEN` bytes are cut on a char
    /// boundary.
    pub fn forward(&self, msg: &str) -> Result<(), LogError> {
        let msg = truncate_message(msg);
        let slot = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(callback) => {
                callback(msg);
                Ok(())
            }
            None => Err(LogError::NoCallback),
        }
    }

    /// Formats and forwards one message, applying the missing-callback
    /// policy when nobody is listening.
    pub fn log(&self, args: fmt::Arguments<'_>) {
        let msg = format_bounded(args).unwrap_or_else(|_| FORMAT_FALLBACK_MESSAGE.to_string());
        if let Err(err) = self.forward(&msg) {
            self.undelivered(err);
        }
    }

    pub(crate) fn undelivered(&self, err: LogError) {
        match self.on_missing {
            MissingCallback::Terminate => {
                eprintln!("remdisp: {}", err);
                std::process::exit(libc::EXIT_FAILURE);
            }
            MissingCallback::Discard => {}
        }
    }
}

/// A callback that re-emits library messages through the `log` facade.
pub fn log_to_logger() -> impl Fn(&str) + Send + Sync + 'static {
    |msg: &str| log::info!(target: LIBRARY_LOG_TARGET, "{}", msg.trim_end())
}

/// Formats `args` into at most `MAX_LOG_MESSAGE_LEN` bytes.
///
/// Output that does not fit is truncated, never an error. `Err` means a
/// `Display` implementation inside `args` reported failure.
pub fn format_bounded(args: fmt::Arguments<'_>) -> Result<String, LogError> {
    let mut writer = BoundedWriter::new(MAX_LOG_MESSAGE_LEN);
    fmt::write(&mut writer, args).map_err(|_| LogError::Format)?;
    Ok(writer.buf)
}

fn truncate_message(msg: &str) -> &str {
    &msg[..floor_char_boundary(msg, MAX_LOG_MESSAGE_LEN)]
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut end = index;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

struct BoundedWriter {
    buf: String,
    limit: usize,
    full: bool,
}

impl BoundedWriter {
    fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
            full: false,
        }
    }
}

impl fmt::Write for BoundedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.full {
            return Ok(());
        }
        let remaining = self.limit - self.buf.len();
        if s.len() <= remaining {
            self.buf.push_str(s);
        } else {
            self.buf.push_str(&s[..floor_char_boundary(s, remaining)]);
            self.full = true;
        }
        Ok(())
    }
}

/// FFI edge used by the libevdi backend.
#[cfg_attr(not(feature = "evdi"), allow(dead_code))]
pub(crate) mod ffi {
    use super::LogForwarder;
    use std::ffi::{c_char, c_void, CStr};

    /// printf-style sink handed to `evdi_set_logging`.
    pub(crate) type RawLogFunction = unsafe extern "C" fn(*mut c_void, *const c_char, ...);

    extern "C" {
        /// Formats into a `LOG_MESSAGE_CAPACITY` byte buffer and calls
        /// `remdisp_log_dispatch`. Defined in csrc/log_trampoline.c.
        pub(crate) fn remdisp_log_trampoline(forwarder: *mut c_void, fmt: *const c_char, ...);
    }

    pub(crate) fn trampoline() -> RawLogFunction {
        remdisp_log_trampoline
    }

    /// Called from the C trampoline with the finished message.
    ///
    /// # Safety
    ///
    /// `forwarder` is either null or the pointer registered through
    /// `EvdiBackend::set_logging`, which keeps the forwarder alive for as
    /// long as it stays registered. `msg` is a NUL terminated string.
    #[no_mangle]
    pub unsafe extern "C" fn remdisp_log_dispatch(forwarder: *mut c_void, msg: *const c_char) {
        if forwarder.is_null() {
            eprintln!("remdisp: log callback not set");
            std::process::exit(libc::EXIT_FAILURE);
        }
        if msg.is_null() {
            return;
        }
        let forwarder = &*(forwarder as *const LogForwarder);
        let msg = CStr::from_ptr(msg).to_string_lossy();
        if let Err(err) = forwarder.forward(&msg) {
            forwarder.undelivered(err);
        }
    }
}

#[cfg(test)]
mod tests;
