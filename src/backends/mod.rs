// src/backends/mod.rs
//
// Implementations of the `device::Backend` trait.

#[cfg(feature = "evdi")]
pub mod evdi;
pub mod mock;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which backend the binaries drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// The system libevdi. Only usable when built with the `evdi` feature.
    Evdi,
    /// In-process simulation.
    Mock,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "evdi") {
            BackendKind::Evdi
        } else {
            BackendKind::Mock
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Evdi => write!(f, "evdi"),
            BackendKind::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evdi" => Ok(BackendKind::Evdi),
            "mock" => Ok(BackendKind::Mock),
            other => Err(anyhow::anyhow!("Unknown backend '{}'", other)),
        }
    }
}
