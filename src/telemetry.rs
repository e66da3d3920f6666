//! System metrics: the values effects react to, plus a local `/proc` sampler.
//!
//! The renderer normally takes its metrics from the telemetry document the
//! producer process writes. When that document is stale or missing it falls
//! back to [`ProcSampler`], which is also what `lightbar publish` uses to
//! produce the document in the first place.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Temperature assumed when no sensor can be read (C)
pub const DEFAULT_TEMPERATURE: f32 = 50.0;

/// Default thermal zone on Jetson boards
pub const DEFAULT_THERMAL_SENSOR: &str = "/sys/class/thermal/thermal_zone0/temp";

/// One sample of system load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub ram_percent: f32,
    pub temperature_c: f32,
    /// 1-minute load average
    pub load_avg_1m: f32,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            ram_percent: 0.0,
            temperature_c: DEFAULT_TEMPERATURE,
            load_avg_1m: 0.0,
        }
    }
}

impl SystemMetrics {
    /// Normalized load in [0, 1]: 60% CPU, 30% RAM, 10% load average per core.
    pub fn normalized_load(&self, cpu_count: usize) -> f32 {
        normalized_load(
            self.cpu_percent,
            self.ram_percent,
            self.load_avg_1m,
            cpu_count,
        )
    }

    /// Chaos factor for these metrics.
    pub fn chaos(&self) -> f32 {
        crate::chaos::randomness(self.cpu_percent, self.ram_percent, self.temperature_c)
    }
}

/// Normalized load in [0, 1] from percentages and the 1-minute load average.
pub fn normalized_load(cpu_percent: f32, ram_percent: f32, load_avg: f32, cpu_count: usize) -> f32 {
    let finite = |x: f32| if x.is_finite() { x } else { 0.0 };
    let cpu = finite(cpu_percent) / 100.0;
    let ram = finite(ram_percent) / 100.0;
    let load = (finite(load_avg) / cpu_count.max(1) as f32).min(1.0);
    (cpu * 0.6 + ram * 0.3 + load * 0.1).clamp(0.0, 1.0)
}

/// Number of logical CPUs, never zero.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ============================================================================
// /proc sampler
// ============================================================================

/// Aggregate CPU jiffies from the first line of `/proc/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    // guest time is already counted in user/nice
    let total = fields.iter().take(8).sum();
    Some(CpuTimes { idle, total })
}

fn cpu_percent_between(prev: CpuTimes, cur: CpuTimes) -> Option<f32> {
    let total = cur.total.checked_sub(prev.total)?;
    let idle = cur.idle.checked_sub(prev.idle)?;
    if total == 0 {
        return None;
    }
    Some((1.0 - idle as f32 / total as f32).clamp(0.0, 1.0) * 100.0)
}

fn parse_ram_percent(meminfo: &str) -> Option<f32> {
    let field = |name: &str| {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<f64>().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some((((total - available) / total) * 100.0).clamp(0.0, 100.0) as f32)
}

fn parse_loadavg(loadavg: &str) -> Option<[f32; 3]> {
    let mut it = loadavg.split_whitespace().map(|v| v.parse::<f32>().ok());
    Some([it.next()??, it.next()??, it.next()??])
}

fn parse_millidegrees(raw: &str) -> Option<f32> {
    raw.trim().parse::<i64>().ok().map(|m| m as f32 / 1000.0)
}

/// Samples system metrics from procfs and sysfs.
///
/// CPU usage is the busy share of jiffies since the previous sample, so the
/// first sample after construction reports 0%.
#[derive(Debug)]
pub struct ProcSampler {
    proc_root: PathBuf,
    sensor_path: PathBuf,
    last_cpu: Option<CpuTimes>,
    last_load: [f32; 3],
}

impl ProcSampler {
    pub fn new(sensor_path: impl Into<PathBuf>) -> Self {
        Self::with_proc_root("/proc", sensor_path)
    }

    /// Sampler reading `stat`, `meminfo` and `loadavg` under another root.
    pub fn with_proc_root(proc_root: impl Into<PathBuf>, sensor_path: impl Into<PathBuf>) -> Self {
        let mut sampler = Self {
            proc_root: proc_root.into(),
            sensor_path: sensor_path.into(),
            last_cpu: None,
            last_load: [0.0; 3],
        };
        sampler.last_cpu = sampler.read_cpu_times();
        sampler
    }

    fn read(&self, name: &str) -> Option<String> {
        let path = self.proc_root.join(name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Some(s),
            Err(e) => {
                debug!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_cpu_times(&self) -> Option<CpuTimes> {
        self.read("stat").as_deref().and_then(parse_cpu_times)
    }

    /// Read the thermal sensor, falling back to 50 C.
    pub fn temperature(&self) -> f32 {
        read_temperature(&self.sensor_path).unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Full 1/5/15-minute load averages from the last sample.
    pub fn load_averages(&self) -> [f32; 3] {
        self.last_load
    }

    pub fn sample(&mut self) -> SystemMetrics {
        let cur = self.read_cpu_times();
        let cpu_percent = match (self.last_cpu, cur) {
            (Some(prev), Some(cur)) => cpu_percent_between(prev, cur).unwrap_or(0.0),
            _ => 0.0,
        };
        if cur.is_some() {
            self.last_cpu = cur;
        }

        let ram_percent = self
            .read("meminfo")
            .as_deref()
            .and_then(parse_ram_percent)
            .unwrap_or(0.0);

        if let Some(load) = self.read("loadavg").as_deref().and_then(parse_loadavg) {
            self.last_load = load;
        }

        SystemMetrics {
            cpu_percent,
            ram_percent,
            temperature_c: self.temperature(),
            load_avg_1m: self.last_load[0],
        }
    }
}

/// Read a sysfs thermal zone (millidegrees C).
pub fn read_temperature(path: &Path) -> Option<f32> {
    std::fs::read_to_string(path)
        .ok()
        .as_deref()
        .and_then(parse_millidegrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_load_weights() {
        // 0.2*0.6 + 0.3*0.3 + 0 = 0.21
        let load = normalized_load(20.0, 30.0, 0.0, 4);
        assert!((load - 0.21).abs() < 1e-6);

        // load average is per core and capped at 1
        let load = normalized_load(0.0, 0.0, 16.0, 4);
        assert!((load - 0.1).abs() < 1e-6);

        assert_eq!(normalized_load(100.0, 100.0, 100.0, 1), 1.0);
        assert_eq!(normalized_load(f32::NAN, 0.0, 0.0, 0), 0.0);
    }

    #[test]
    fn test_parse_cpu_times() {
        let stat = "cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 50 0 50 350 50 0 0 0 0 0\n";
        let t = parse_cpu_times(stat).unwrap();
        assert_eq!(t.idle, 800);
        assert_eq!(t.total, 1000);

        let next = CpuTimes {
            idle: 850,
            total: 1100,
        };
        assert_eq!(cpu_percent_between(t, next), Some(50.0));
        assert_eq!(cpu_percent_between(t, t), None);
    }

    #[test]
    fn test_parse_meminfo() {
        let meminfo = "MemTotal:  1000 kB\nMemFree:  100 kB\nMemAvailable:  250 kB\n";
        assert_eq!(parse_ram_percent(meminfo), Some(75.0));
        assert_eq!(parse_ram_percent("MemTotal: 1000 kB\n"), None);
    }

    #[test]
    fn test_parse_loadavg_and_thermal() {
        assert_eq!(
            parse_loadavg("0.52 0.58 0.59 1/467 12345\n"),
            Some([0.52, 0.58, 0.59])
        );
        assert_eq!(parse_loadavg("garbage"), None);
        assert_eq!(parse_millidegrees("45500\n"), Some(45.5));
        assert_eq!(parse_millidegrees(""), None);
    }

    #[test]
    fn test_sampler_on_fake_proc() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("stat"), "cpu  100 0 100 700 100 0 0 0 0 0\n").unwrap();
        std::fs::write(
            root.join("meminfo"),
            "MemTotal: 1000 kB\nMemAvailable: 500 kB\n",
        )
        .unwrap();
        std::fs::write(root.join("loadavg"), "2.00 1.00 0.50 1/100 1\n").unwrap();
        std::fs::write(root.join("temp"), "71000\n").unwrap();

        let mut sampler = ProcSampler::with_proc_root(root, root.join("temp"));
        std::fs::write(root.join("stat"), "cpu  200 0 200 750 150 0 0 0 0 0\n").unwrap();

        let m = sampler.sample();
        // busy 200 of 300 jiffies
        assert!((m.cpu_percent - 66.666_67).abs() < 1e-3);
        assert_eq!(m.ram_percent, 50.0);
        assert_eq!(m.load_avg_1m, 2.0);
        assert_eq!(m.temperature_c, 71.0);
        assert_eq!(sampler.load_averages(), [2.0, 1.0, 0.5]);
    }

    #[test]
    fn test_missing_sensor_defaults() {
        let sampler = ProcSampler::with_proc_root("/nonexistent", "/nonexistent/temp");
        assert_eq!(sampler.temperature(), DEFAULT_TEMPERATURE);
    }
}
