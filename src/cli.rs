// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lightbar")]
#[command(author, version, about = "System-reactive light bar controller")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/lightbar/lightbar.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the renderer (default)
    #[command(visible_alias = "r")]
    Run {
        /// Start with this effect (written to the control document)
        #[arg(short, long)]
        effect: Option<String>,

        /// Render into memory instead of the i2c bus
        #[arg(long)]
        dry_run: bool,

        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        duration_secs: Option<u64>,
    },

    /// Show schedule, control, and telemetry state
    #[command(visible_alias = "st")]
    Status,

    /// Update the control document
    #[command(visible_alias = "ctl")]
    Control {
        /// Effect name (see `lightbar effects`)
        #[arg(short, long)]
        effect: Option<String>,

        /// Brightness percent
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=100))]
        brightness: Option<u32>,

        /// Turn output on
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Turn output off
        #[arg(long)]
        disable: bool,

        /// Run the demo sequence once
        #[arg(long)]
        demo: bool,
    },

    /// Force lights on or off for a while, or return to the schedule
    #[command(visible_alias = "ov")]
    Override {
        /// on, off, or clear
        #[arg(value_enum)]
        action: OverrideAction,

        /// Override length in minutes
        #[arg(short, long, default_value = "60")]
        minutes: u64,
    },

    /// Show or change the daily schedule
    #[command(visible_alias = "sched")]
    Schedule {
        #[command(subcommand)]
        action: Option<ScheduleAction>,
    },

    /// Publish telemetry from /proc for the renderer
    #[command(visible_alias = "pub")]
    Publish {
        /// Sampling interval in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,

        /// Publish one sample and exit
        #[arg(long)]
        once: bool,
    },

    /// List available effects
    #[command(visible_alias = "fx")]
    Effects,

    /// Print the effective configuration
    Config {
        /// Also write it to the config path
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverrideAction {
    On,
    Off,
    Clear,
}

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Print the schedule window and state
    Show,

    /// Write a new schedule window
    Set {
        /// Start time (HH:MM)
        #[arg(long)]
        start: String,

        /// End time (HH:MM)
        #[arg(long)]
        end: String,

        /// Keep the window but ignore it (lights always on)
        #[arg(long)]
        disabled: bool,
    },
}
