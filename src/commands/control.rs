//! Control document writers.

use anyhow::{anyhow, bail};
use lightbar::channel::{ControlChannel, OverrideRequest};
use lightbar::clock::unix_now;
use lightbar::config::Config;
use lightbar::effect::EffectKind;

use super::CommandResult;
use crate::cli::OverrideAction;

/// Merge the given fields into the control document.
pub fn control(
    config: &Config,
    effect: Option<&str>,
    brightness: Option<u32>,
    enable: bool,
    disable: bool,
    demo: bool,
) -> CommandResult {
    let effect = effect
        .map(|name| {
            name.parse::<EffectKind>()
                .map_err(|e| anyhow!("{e} (try `lightbar effects`)"))
        })
        .transpose()?;

    if effect.is_none() && brightness.is_none() && !enable && !disable && !demo {
        bail!("nothing to change (see `lightbar control --help`)");
    }

    let channel = ControlChannel::new(&config.paths.control);
    let doc = channel.update(unix_now(), |doc| {
        if let Some(kind) = effect {
            doc.effect = kind.name().to_string();
        }
        if let Some(b) = brightness {
            doc.brightness = b;
        }
        if enable {
            doc.enabled = true;
        }
        if disable {
            doc.enabled = false;
        }
        if demo {
            doc.demo_mode = true;
        }
    })?;

    println!("Control: {}", channel.path().display());
    println!("  Effect:     {}", doc.effect);
    println!("  Brightness: {}%", doc.brightness);
    println!("  Enabled:    {}", if doc.enabled { "yes" } else { "no" });
    if doc.demo_mode {
        println!("  Demo:       requested");
    }
    Ok(())
}

/// Queue an override request for the renderer.
pub fn override_schedule(config: &Config, action: OverrideAction, minutes: u64) -> CommandResult {
    let request = match action {
        OverrideAction::On | OverrideAction::Off => OverrideRequest::Set {
            turn_on: action == OverrideAction::On,
            duration_secs: minutes.saturating_mul(60),
        },
        OverrideAction::Clear => OverrideRequest::Clear,
    };

    let channel = ControlChannel::new(&config.paths.control);
    channel.update(unix_now(), |doc| doc.override_request = Some(request))?;

    match request {
        OverrideRequest::Set { turn_on, .. } => println!(
            "Override requested: lights {} for {} min",
            if turn_on { "on" } else { "off" },
            minutes
        ),
        OverrideRequest::Clear => println!("Override clear requested"),
    }
    Ok(())
}
