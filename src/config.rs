// src/config.rs

//! Configuration for the remdisp binaries.
//!
//! Every field has a default reproducing the fixed constants of the sample
//! client, so running without a config file behaves like the classic demo.
//! A JSON file named by `REMDISP_CONFIG` overrides any subset of fields, and
//! `REMDISP_BACKEND` overrides the backend choice.

use crate::backends::BackendKind;
use crate::device::sysfs::DEFAULT_SYSFS_ROOT;
use crate::device::DEFAULT_SKU_AREA_LIMIT;
use crate::logging::MissingCallback;
use anyhow::{Context, Result};
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "REMDISP_CONFIG";
pub const BACKEND_ENV: &str = "REMDISP_BACKEND";

/// Process-wide configuration, loaded on first use.
///
/// A config file that cannot be read or parsed is reported and replaced by
/// the defaults.
pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::from_env().unwrap_or_else(|e| {
        warn!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default().with_env_overrides()
    })
});

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub device: DeviceSettings,
    pub sample: SampleSettings,
    pub logging: LoggingSettings,
}

/// Which device to drive and what monitor to present on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSettings {
    /// Card index passed to open. The sample uses card 1.
    pub index: i32,
    /// Raw EDID file. `None` uses the built-in sample EDID.
    pub edid_path: Option<PathBuf>,
    /// SKU area limit in pixels.
    pub area: u32,
    /// Location of the kernel module's sysfs attributes.
    pub sysfs_root: PathBuf,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            index: 1,
            edid_path: None,
            area: DEFAULT_SKU_AREA_LIMIT,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
        }
    }
}

/// Frame buffer and polling parameters of the sample client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SampleSettings {
    pub width: i32,
    pub height: i32,
    pub bits_per_pixel: i32,
    /// Number of synchronous update requests issued.
    pub update_iterations: u32,
    /// Pause between update requests. 0 issues them back to back.
    pub update_interval_ms: u64,
    /// Wait for the first event. `None` waits forever.
    pub ready_timeout_ms: Option<u64>,
}

impl Default for SampleSettings {
    fn default() -> Self {
        SampleSettings {
            width: 1280,
            height: 800,
            bits_per_pixel: 32,
            update_iterations: 100,
            update_interval_ms: 0,
            ready_timeout_ms: None,
        }
    }
}

impl SampleSettings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub on_missing_callback: MissingCallback,
}

impl Config {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Defaults, or the file named by `REMDISP_CONFIG`, then env overrides.
    pub fn from_env() -> Result<Self> {
        let config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(BACKEND_ENV) {
            match raw.parse() {
                Ok(kind) => self.backend = kind,
                Err(e) => warn!("Ignoring {}: {}", BACKEND_ENV, e),
            }
        }
        self
    }

    /// EDID bytes to present: the configured file or the sample blob.
    pub fn edid(&self) -> Result<Vec<u8>> {
        match &self.device.edid_path {
            Some(path) => std::fs::read(path)
                .with_context(|| format!("Failed to read EDID from {}", path.display())),
            None => Ok(crate::device::SAMPLE_EDID.to_vec()),
        }
    }
}
