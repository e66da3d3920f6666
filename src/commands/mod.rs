//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `run`: the renderer daemon
//! - `control`: control document writers (control, override)
//! - `schedule`: schedule window show/set
//! - `status`: read-only view of all shared documents
//! - `publish`: telemetry producer
//! - `info`: effects list and effective config

pub mod control;
pub mod info;
pub mod publish;
pub mod run;
pub mod schedule;
pub mod status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use lightbar::config::LinkConfig;
use lightbar_link::{open_i2c, BoxedLink, MemoryLink, RetryLink};
use tracing::info;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Set up a Ctrl-C / SIGTERM handler that sets the given flag to false when
/// triggered. Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}

/// Open the light bar, wrapped with the configured retry policy.
pub fn open_link(config: &LinkConfig, dry_run: bool) -> anyhow::Result<BoxedLink> {
    let policy = config.retry_policy();
    if dry_run || config.dry_run {
        info!("Dry run: rendering into memory");
        return Ok(Box::new(RetryLink::new(MemoryLink::new(), policy)));
    }

    let link = open_i2c(config.bus, config.address).with_context(|| {
        format!(
            "opening light bar on /dev/i2c-{} at 0x{:02X}",
            config.bus, config.address
        )
    })?;
    info!(
        "Light bar on /dev/i2c-{} at 0x{:02X}",
        config.bus, config.address
    );
    Ok(Box::new(RetryLink::new(link, policy)))
}
