//! Read-only overview of the shared documents.

use lightbar::channel::{ControlChannel, TelemetryChannel};
use lightbar::clock::unix_now;
use lightbar::config::Config;
use lightbar::health::Probe;
use lightbar::schedule::Scheduler;
use lightbar::telemetry::cpu_count;

use super::schedule::print_schedule;
use super::CommandResult;

pub fn status(config: &Config) -> CommandResult {
    let now = unix_now();

    let scheduler = Scheduler::load(
        &config.paths.schedule_config,
        &config.paths.schedule_state,
        config.timing.schedule_check_secs,
    );
    print_schedule(config, &scheduler);

    let control = ControlChannel::new(&config.paths.control);
    println!("\nControl: {}", control.path().display());
    match control.read() {
        Ok(doc) => {
            println!("  Effect:     {}", doc.effect);
            println!("  Brightness: {}%", doc.brightness);
            println!("  Enabled:    {}", if doc.enabled { "yes" } else { "no" });
            if doc.demo_mode {
                println!("  Demo:       pending");
            }
            if let Some(request) = doc.override_request {
                println!("  Override:   pending ({request:?})");
            }
        }
        Err(e) if e.is_missing() => println!("  (not written yet, renderer uses defaults)"),
        Err(e) => println!("  Error: {e}"),
    }

    let telemetry = TelemetryChannel::new(&config.paths.telemetry);
    let read = telemetry.read();
    let probe = Probe::classify(&read, now, config.timing.stale_after_secs);
    println!("\nTelemetry: {}", telemetry.path().display());
    println!(
        "  Health:     {} ({})",
        if probe.is_healthy() { "ok" } else { "unhealthy" },
        probe
    );
    if let Ok(doc) = read {
        let metrics = doc.metrics();
        println!("  CPU:        {:.1}%", metrics.cpu_percent);
        println!("  RAM:        {:.1}%", metrics.ram_percent);
        println!("  Temp:       {:.1} C", metrics.temperature_c);
        println!(
            "  Load:       {:.2} (normalized {:.2})",
            metrics.load_avg_1m,
            metrics.normalized_load(cpu_count())
        );
        println!("  Chaos:      {:.2}", metrics.chaos());
    }
    Ok(())
}
