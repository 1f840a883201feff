// src/lib.rs

//! Client side of the evdi virtual display interface.
//!
//! `logging` forwards the library's log output to a caller supplied
//! callback, `device` and `session` give a typed view of the device API, and
//! `sample` is the demonstration client the `remdisp-sample` binary runs.

pub mod backends;
pub mod config;
pub mod device;
pub mod logging;
pub mod os;
pub mod sample;
pub mod session;

pub use device::{Backend, DeviceConfig, DeviceError, DeviceHandle};
pub use logging::{LogForwarder, MissingCallback};
pub use session::Session;

/// Initializes `env_logger` the way every remdisp binary does: `info` unless
/// `RUST_LOG` says otherwise, with microsecond timestamps.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();
}
