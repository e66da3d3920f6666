//! lightbar: system-reactive light bar controller
//!
//! Entry point: parses the CLI, initializes logging and dispatches to the
//! command handlers.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands, ScheduleAction};
use lightbar::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config (missing file: defaults)
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    info!("Loading config from {:?}", config_path);
    let config = Config::load_or_default(&config_path)?;

    match cli.command {
        None => commands::run::run(config, None, false, None)?,
        Some(Commands::Run {
            effect,
            dry_run,
            duration_secs,
        }) => commands::run::run(config, effect.as_deref(), dry_run, duration_secs)?,
        Some(Commands::Status) => commands::status::status(&config)?,
        Some(Commands::Control {
            effect,
            brightness,
            enable,
            disable,
            demo,
        }) => commands::control::control(
            &config,
            effect.as_deref(),
            brightness,
            enable,
            disable,
            demo,
        )?,
        Some(Commands::Override { action, minutes }) => {
            commands::control::override_schedule(&config, action, minutes)?
        }
        Some(Commands::Schedule { action }) => match action {
            None | Some(ScheduleAction::Show) => commands::schedule::show(&config)?,
            Some(ScheduleAction::Set {
                start,
                end,
                disabled,
            }) => commands::schedule::set(&config, &start, &end, disabled)?,
        },
        Some(Commands::Publish { interval_ms, once }) => {
            commands::publish::publish(&config, interval_ms, once)?
        }
        Some(Commands::Effects) => commands::info::effects()?,
        Some(Commands::Config { save }) => commands::info::config(&config, &config_path, save)?,
    }

    Ok(())
}
