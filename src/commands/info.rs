//! Effects list and effective configuration.

use std::path::Path;

use lightbar::config::Config;
use lightbar::effect::{EffectKind, MetricShape};

use super::CommandResult;

pub fn effects() -> CommandResult {
    println!("Effects:");
    for kind in EffectKind::ALL {
        let input = match kind.shape() {
            MetricShape::Load => "load",
            MetricShape::LoadAndTemperature => "load + temperature",
            MetricShape::CpuAndRam => "cpu + ram",
        };
        println!("  {:<18} {} [{}]", kind.name(), kind.description(), input);
    }
    Ok(())
}

pub fn config(config: &Config, path: &Path, save: bool) -> CommandResult {
    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    if save {
        config.save(path)?;
        println!("# saved");
    }
    Ok(())
}
