// src/sample.rs

//! The sample client: connect, wait for the first events, register one
//! frame buffer and request updates into it a fixed number of times.
//!
//! It is a script, not a reusable API. The interesting part is that it runs
//! unchanged against any `Backend`, which is how the tests drive it.

use crate::config::Config;
use crate::device::{
    Backend, Buffer, BufferId, CursorMove, CursorSet, DdcCiData, DeviceConfig, EventHandler,
    Mode, UpdateStatus,
};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::time::Duration;

/// Id of the single buffer the sample registers.
pub const SAMPLE_BUFFER_ID: BufferId = 0;

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub device_index: i32,
    pub device: DeviceConfig,
    pub width: i32,
    pub height: i32,
    pub bits_per_pixel: i32,
    pub update_iterations: u32,
    pub update_interval: Duration,
    pub ready_timeout: Option<Duration>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        let config = Config::default();
        Self {
            device_index: config.device.index,
            device: DeviceConfig::sample(),
            width: config.sample.width,
            height: config.sample.height,
            bits_per_pixel: config.sample.bits_per_pixel,
            update_iterations: config.sample.update_iterations,
            update_interval: config.sample.update_interval(),
            ready_timeout: config.sample.ready_timeout(),
        }
    }
}

impl SampleConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            device_index: config.device.index,
            device: DeviceConfig::new(config.edid()?, config.device.area),
            width: config.sample.width,
            height: config.sample.height,
            bits_per_pixel: config.sample.bits_per_pixel,
            update_iterations: config.sample.update_iterations,
            update_interval: config.sample.update_interval(),
            ready_timeout: config.sample.ready_timeout(),
        })
    }

    pub fn stride(&self) -> i32 {
        self.bits_per_pixel / 8 * self.width
    }
}

/// What happened during a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SampleReport {
    pub mode: Option<Mode>,
    pub mode_changes: usize,
    pub async_updates: usize,
    pub sync_updates: usize,
    pub pending_updates: usize,
    pub rects_grabbed: usize,
}

#[derive(Default)]
struct SampleHandler {
    modes: Vec<Mode>,
    updates_ready: Vec<BufferId>,
}

impl EventHandler for SampleHandler {
    fn mode_changed(&mut self, mode: Mode) {
        info!("Mode changed handler: {}", mode);
        self.modes.push(mode);
    }

    fn update_ready(&mut self, buffer: BufferId) {
        info!("Got update async for buffer {}", buffer);
        self.updates_ready.push(buffer);
    }

    fn dpms(&mut self, mode: i32) {
        debug!("DPMS mode {}", mode);
    }

    fn crtc_state(&mut self, state: i32) {
        debug!("CRTC state {}", state);
    }

    fn cursor_set(&mut self, cursor: CursorSet) {
        debug!(
            "Cursor set {}x{} enabled={}",
            cursor.width, cursor.height, cursor.enabled
        );
    }

    fn cursor_move(&mut self, cursor: CursorMove) {
        debug!("Cursor move {:?}", cursor);
    }

    fn ddcci_data(&mut self, data: DdcCiData) {
        debug!("DDC/CI data for {:#x}, {} bytes", data.address, data.payload.len());
    }
}

/// Runs the sample script against `backend`.
pub fn run<B: Backend>(backend: &B, config: &SampleConfig) -> Result<SampleReport> {
    let mut report = SampleReport::default();

    let handle = backend
        .open(config.device_index)
        .with_context(|| format!("Failed to open device {}", config.device_index))?;
    let mut session = Session::new(handle);

    session
        .connect(&config.device)
        .context("Failed to connect device")?;

    if !session
        .poll_ready(config.ready_timeout)
        .context("Failed waiting for device events")?
    {
        bail!(
            "No events from the device within {:?}",
            config.ready_timeout.unwrap_or_default()
        );
    }

    let mut handler = SampleHandler::default();
    session
        .handle_events(&mut handler)
        .context("Failed to handle device events")?;
    report.mode_changes = handler.modes.len();
    report.mode = handler.modes.last().copied();

    // No buffer is registered yet, so early updates are grabbed into a
    // pixel-less scratch buffer that only keeps the rectangles.
    for id in handler.updates_ready {
        report.async_updates += 1;
        let mut scratch = Buffer::new(id, 0, 0, 0);
        let rects = session
            .grab_into(&mut scratch)
            .with_context(|| format!("Failed to grab update for buffer {}", id))?
            .len();
        info!("Got {} rects", rects);
        report.rects_grabbed += rects;
    }

    let buffer = Buffer::new(
        SAMPLE_BUFFER_ID,
        config.width,
        config.height,
        config.stride(),
    );
    let id = session
        .register_buffer(buffer)
        .context("Failed to register frame buffer")?;
    info!(
        "Registered buffer {} ({}x{}, stride {})",
        id,
        config.width,
        config.height,
        config.stride()
    );

    for n in 0..config.update_iterations {
        match session
            .request_update(id)
            .with_context(|| format!("Update request {} failed", n))?
        {
            UpdateStatus::Ready => {
                info!("Got update sync");
                let rects = session.grab_pixels(id)?.len();
                info!("Got {} rects", rects);
                report.sync_updates += 1;
                report.rects_grabbed += rects;
            }
            UpdateStatus::Pending => {
                info!("Update coming async");
                report.pending_updates += 1;
            }
        }

        if !config.update_interval.is_zero() {
            std::thread::sleep(config.update_interval);
        }
    }

    Ok(report)
}
