//! Schedule window commands.

use chrono::{Local, TimeZone};
use lightbar::clock::{local_time_of_day, unix_now};
use lightbar::config::Config;
use lightbar::schedule::{ScheduleWindow, Scheduler};

use super::CommandResult;

fn open(config: &Config) -> Scheduler {
    Scheduler::load(
        &config.paths.schedule_config,
        &config.paths.schedule_state,
        config.timing.schedule_check_secs,
    )
}

/// Format a Unix timestamp as local date and time.
pub fn format_timestamp(ts: f64) -> String {
    Local
        .timestamp_opt(ts.floor() as i64, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{ts:.0}"))
}

/// Print the window and the persisted state.
pub fn show(config: &Config) -> CommandResult {
    let scheduler = open(config);
    print_schedule(config, &scheduler);
    Ok(())
}

pub fn print_schedule(config: &Config, scheduler: &Scheduler) {
    let now = unix_now();
    let local = local_time_of_day();
    let state = scheduler.state();

    println!("Schedule: {}", config.paths.schedule_config.display());
    println!("  Window:     {}", scheduler.window());
    println!(
        "  Now:        {} ({})",
        local.format("%H:%M"),
        if scheduler.is_within_schedule(local) {
            "inside window"
        } else {
            "outside window"
        }
    );
    println!("  State:      {}", state.schedule_state);
    if let Some(until) = state.override_until {
        let left = (until - now).max(0.0);
        println!(
            "  Override:   until {} ({:.0} min left)",
            format_timestamp(until),
            left / 60.0
        );
    }
    if let Some(at) = state.last_transition {
        println!("  Changed:    {}", format_timestamp(at));
    }
    println!(
        "  Lights:     {}",
        if scheduler.should_be_on(now, local) {
            "on"
        } else {
            "off"
        }
    );
}

/// Write a new window. A running renderer picks it up on its next tick.
pub fn set(config: &Config, start: &str, end: &str, disabled: bool) -> CommandResult {
    let window = ScheduleWindow::parse(!disabled, start, end)?;
    let mut scheduler = open(config);
    scheduler.save_window(window)?;
    println!("Schedule set: {}", window);
    Ok(())
}
