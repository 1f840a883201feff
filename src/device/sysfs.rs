// src/device/sysfs.rs

//! The kernel module's control attributes under `/sys/devices/evdi`.

use crate::device::error::{DeviceError, RemoveError};
use crate::device::types::DeviceStatus;
use crate::device::Backend;
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/devices/evdi";

/// Upper bound on card indices probed by [`find_available`]. DRM minors
/// stop well before this.
const MAX_PROBED_DEVICES: i32 = 64;

#[derive(Debug, Clone)]
pub struct EvdiSysfs {
    root: PathBuf,
}

impl Default for EvdiSysfs {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl EvdiSysfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The module publishes `version` as soon as it is loaded.
    pub fn is_installed(&self) -> bool {
        self.root.join("version").exists()
    }

    pub fn version(&self) -> Result<String, DeviceError> {
        Ok(fs::read_to_string(self.root.join("version"))?.trim().to_string())
    }

    pub fn count(&self) -> Result<u32, DeviceError> {
        let raw = fs::read_to_string(self.root.join("count"))?;
        let count = raw.trim();
        count
            .parse()
            .map_err(|_| DeviceError::CountParse(count.to_string()))
    }

    /// Removes every device the module created. Needs root.
    pub fn remove_all(&self) -> Result<(), RemoveError> {
        let mut f = OpenOptions::new()
            .write(true)
            .open(self.root.join("remove_all"))?;
        f.write_all(b"1")?;
        info!("Removed all evdi devices via {}", self.root.display());
        Ok(())
    }
}

/// Finds the first device index whose status is `Available`.
pub fn find_available<B: Backend + ?Sized>(
    backend: &B,
    sysfs: &EvdiSysfs,
) -> Result<i32, DeviceError> {
    if !sysfs.is_installed() {
        return Err(DeviceError::NotInstalled);
    }

    if sysfs.count()? == 0 {
        return Err(DeviceError::NoDevices);
    }

    for index in 0..MAX_PROBED_DEVICES {
        let status = backend.check_device(index);
        debug!("Device /dev/dri/card{} status {:?}", index, status);
        if status == DeviceStatus::Available {
            info!("Got device /dev/dri/card{}", index);
            return Ok(index);
        }
    }

    Err(DeviceError::NoneAvailable)
}
