// src/main.rs

use remdisp::backends::mock::MockBackend;
use remdisp::backends::BackendKind;
use remdisp::config::CONFIG;
use remdisp::logging::{log_to_logger, LogForwarder};
use remdisp::sample::{self, SampleConfig, SampleReport};
use remdisp::Backend;

use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;

/// Runs the sample client against the configured backend.
fn main() -> Result<()> {
    remdisp::init_logger();

    info!("Starting remdisp sample client...");
    info!("Backend: {}", CONFIG.backend);

    let sample_config = SampleConfig::from_config(&CONFIG).context("Invalid configuration")?;

    let forwarder = Arc::new(LogForwarder::new(CONFIG.logging.on_missing_callback));
    forwarder.set_callback(log_to_logger());

    let result = match CONFIG.backend {
        BackendKind::Mock => run_with(MockBackend::default(), forwarder, &sample_config),
        BackendKind::Evdi => run_evdi(forwarder, &sample_config),
    };

    match result {
        Ok(report) => {
            info!(
                "Sample finished: {} mode change(s), {} sync update(s), {} pending, {} rects grabbed",
                report.mode_changes,
                report.sync_updates,
                report.pending_updates,
                report.rects_grabbed
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "Sample client failed: {:#}. Root cause: {:?}",
                e,
                e.root_cause()
            );
            Err(e)
        }
    }
}

fn run_with<B: Backend>(
    backend: B,
    forwarder: Arc<LogForwarder>,
    config: &SampleConfig,
) -> Result<SampleReport> {
    backend.set_logging(forwarder);
    sample::run(&backend, config)
}

#[cfg(feature = "evdi")]
fn run_evdi(forwarder: Arc<LogForwarder>, config: &SampleConfig) -> Result<SampleReport> {
    run_with(
        remdisp::backends::evdi::EvdiBackend::new(),
        forwarder,
        config,
    )
}

#[cfg(not(feature = "evdi"))]
fn run_evdi(_forwarder: Arc<LogForwarder>, _config: &SampleConfig) -> Result<SampleReport> {
    Err(anyhow::anyhow!(
        "Not built with feature `evdi`; set REMDISP_BACKEND=mock"
    ))
}
