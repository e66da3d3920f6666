//! Renderer daemon command.

use std::time::Duration;

use anyhow::anyhow;
use lightbar::channel::ControlChannel;
use lightbar::clock::unix_now;
use lightbar::config::Config;
use lightbar::controller::Controller;
use lightbar::effect::EffectKind;
use tracing::info;

use super::{open_link, setup_interrupt_handler, CommandResult};

/// Run the renderer until Ctrl-C (or `duration_secs`).
pub fn run(
    config: Config,
    effect: Option<&str>,
    dry_run: bool,
    duration_secs: Option<u64>,
) -> CommandResult {
    if let Some(name) = effect {
        let kind = name
            .parse::<EffectKind>()
            .map_err(|e| anyhow!("{e} (try `lightbar effects`)"))?;
        // The renderer takes its effect from the control document
        ControlChannel::new(&config.paths.control)
            .update(unix_now(), |doc| doc.effect = kind.name().to_string())?;
        info!("Starting with effect {}", kind);
    }

    let link = open_link(&config.link, dry_run)?;
    let running = setup_interrupt_handler();

    let mut controller = Controller::new(link, config);
    controller.run(running, duration_secs.map(Duration::from_secs));
    Ok(())
}
