//! Telemetry producer.

use std::sync::atomic::Ordering;
use std::time::Duration;

use lightbar::channel::{TelemetryChannel, TelemetryDocument};
use lightbar::clock::unix_now;
use lightbar::config::Config;
use lightbar::telemetry::ProcSampler;
use tracing::{debug, info, warn};

use super::{setup_interrupt_handler, CommandResult};

/// CPU usage needs two samples; this is the gap before a one-shot publish.
const ONE_SHOT_WINDOW: Duration = Duration::from_millis(250);

fn publish_sample(sampler: &mut ProcSampler, channel: &TelemetryChannel) -> CommandResult {
    let metrics = sampler.sample();
    let mut doc = TelemetryDocument::new(&metrics, sampler.load_averages(), 0.0);
    channel.publish(&mut doc, unix_now())?;
    debug!(
        cpu = metrics.cpu_percent,
        ram = metrics.ram_percent,
        temp = metrics.temperature_c,
        "Published telemetry"
    );
    Ok(())
}

pub fn publish(config: &Config, interval_ms: u64, once: bool) -> CommandResult {
    let channel = TelemetryChannel::new(&config.paths.telemetry);
    let mut sampler = ProcSampler::new(&config.thermal.sensor_path);

    if once {
        std::thread::sleep(ONE_SHOT_WINDOW);
        publish_sample(&mut sampler, &channel)?;
        println!("Published to {}", channel.path().display());
        return Ok(());
    }

    let interval = Duration::from_millis(interval_ms.max(100));
    let running = setup_interrupt_handler();
    info!(
        "Publishing telemetry to {} every {}ms",
        channel.path().display(),
        interval.as_millis()
    );

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(interval);
        // A failed write is retried on the next interval
        if let Err(e) = publish_sample(&mut sampler, &channel) {
            warn!("Failed to publish telemetry: {}", e);
        }
    }

    info!("Publisher stopped");
    Ok(())
}
