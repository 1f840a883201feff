// src/bin/create_virtual_device.rs

use anyhow::Result;
use log::info;

#[cfg(feature = "evdi")]
fn main() -> Result<()> {
    use anyhow::Context;
    use remdisp::backends::evdi::EvdiBackend;
    use remdisp::Backend;

    remdisp::init_logger();
    EvdiBackend::new()
        .add_device()
        .context("Failed to create virtual device")?;
    info!("New virtual device created");
    Ok(())
}

#[cfg(not(feature = "evdi"))]
fn main() -> Result<()> {
    remdisp::init_logger();
    info!("Adding devices goes through libevdi");
    Err(anyhow::anyhow!("Not built with feature `evdi`"))
}
