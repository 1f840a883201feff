// src/device/error.rs

use crate::device::types::BufferId;
use nix::errno::Errno;
use std::io;
use thiserror::Error;

/// Whether retrying the failed operation can make sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The handle or the environment is unusable; give up.
    Fatal,
    /// A later attempt may succeed without outside intervention.
    Retryable,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Kernel module evdi not installed")]
    NotInstalled,
    #[error("No evdi devices exist")]
    NoDevices,
    #[error("None of the evdi devices have status available")]
    NoneAvailable,
    #[error("Failed to open device {0}")]
    OpenFailed(i32),
    #[error("Failed to add device. Did you run with superuser permissions?")]
    AddFailed,
    #[error("Device rejected the connection")]
    ConnectRejected,
    #[error("Handle is not connected")]
    NotConnected,
    #[error("Failed to register buffer {0}")]
    BufferRegistrationFailed(BufferId),
    #[error("Buffer {0} is already registered")]
    BufferAlreadyRegistered(BufferId),
    #[error("Buffer {0} is not registered")]
    UnknownBuffer(BufferId),
    #[error("Error polling the event-ready descriptor")]
    Poll(#[source] Errno),
    #[error("Timed out waiting for the device")]
    Timeout,
    #[error("Failed to access evdi sysfs attributes")]
    Sysfs(#[from] io::Error),
    #[error("Failed to parse devices count number: `{0}`")]
    CountParse(String),
}

impl DeviceError {
    pub fn severity(&self) -> Severity {
        match self {
            DeviceError::Timeout | DeviceError::NoneAvailable => Severity::Retryable,
            DeviceError::Poll(errno) if *errno == Errno::EINTR || *errno == Errno::EAGAIN => {
                Severity::Retryable
            }
            _ => Severity::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.severity() == Severity::Retryable
    }
}

#[derive(Debug, Error)]
pub enum RemoveError {
    #[error("Failed to remove device. Did you run with superuser permissions?")]
    Permission,
    #[error("Failed to remove device")]
    Io(#[source] io::Error),
}

impl From<io::Error> for RemoveError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => RemoveError::Permission,
            _ => RemoveError::Io(err),
        }
    }
}
