// src/bin/remove_virtual_devices.rs

use anyhow::{Context, Result};
use log::{info, warn};
use remdisp::config::CONFIG;
use remdisp::device::sysfs::EvdiSysfs;

fn main() -> Result<()> {
    remdisp::init_logger();

    let sysfs = EvdiSysfs::new(&CONFIG.device.sysfs_root);
    if !sysfs.is_installed() {
        return Err(anyhow::anyhow!(
            "Kernel module evdi not installed ({} missing)",
            sysfs.root().display()
        ));
    }

    let before = sysfs.count();
    sysfs.remove_all().context("Failed to remove virtual devices")?;
    match before {
        Ok(count) => info!("Removed all devices ({} before)", count),
        Err(err) => {
            warn!("Could not read the device count before removal: {}", err);
            info!("Removed all devices");
        }
    }
    Ok(())
}
