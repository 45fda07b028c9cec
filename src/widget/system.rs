//! Local system readings for the CPU / RAM / TEMP widgets.
//!
//! All three read Linux pseudo-files directly. Failures return `None`
//! and the key face shows a placeholder; a deck without a thermal zone
//! is normal, not an error.

use std::fs;

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// CPU utilisation needs two samples; the first call after startup
/// reports against boot-time totals, which is close enough for a
/// dashboard tile.
#[derive(Debug, Default)]
pub struct CpuSampler {
    last_total: u64,
    last_idle: u64,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate utilisation percent since the previous call.
    pub fn sample(&mut self) -> Option<u8> {
        let stat = fs::read_to_string(PROC_STAT).ok()?;
        let (total, idle) = parse_cpu_line(&stat)?;

        let dt = total.saturating_sub(self.last_total);
        let di = idle.saturating_sub(self.last_idle);
        self.last_total = total;
        self.last_idle = idle;

        if dt == 0 {
            return Some(0);
        }
        let busy = dt.saturating_sub(di);
        Some(((busy * 100) / dt).min(100) as u8)
    }
}

/// First line of /proc/stat -> (total jiffies, idle + iowait jiffies).
fn parse_cpu_line(stat: &str) -> Option<(u64, u64)> {
    let line = stat.lines().next()?;
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let values: Vec<u64> = fields.filter_map(|f| f.parse().ok()).collect();
    if values.len() < 5 {
        return None;
    }
    let total = values.iter().sum();
    let idle = values[3] + values[4];
    Some((total, idle))
}

/// RAM used percent, from MemTotal and MemAvailable.
pub fn ram_percent() -> Option<u8> {
    let meminfo = fs::read_to_string(PROC_MEMINFO).ok()?;
    parse_meminfo(&meminfo)
}

fn parse_meminfo(meminfo: &str) -> Option<u8> {
    let mut total = None;
    let mut available = None;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_kib(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_kib(rest);
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }
    let total = total?;
    let available = available?;
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some(((used * 100) / total).min(100) as u8)
}

fn parse_kib(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}

/// Thermal zone 0, reported in whole degrees Celsius.
pub fn temp_celsius() -> Option<u8> {
    let raw = fs::read_to_string(THERMAL_ZONE).ok()?;
    let millideg: i64 = raw.trim().parse().ok()?;
    u8::try_from(millideg / 1000).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_line_sums_total_and_idle() {
        let stat = "cpu  100 0 100 600 200 0 0 0 0 0\ncpu0 50 0 50 300 100 0 0 0 0 0\n";
        let (total, idle) = parse_cpu_line(stat).unwrap();
        assert_eq!(total, 1000);
        assert_eq!(idle, 800);
    }

    #[test]
    fn cpu_line_rejects_garbage() {
        assert!(parse_cpu_line("intr 12345\n").is_none());
        assert!(parse_cpu_line("cpu 1 2\n").is_none());
        assert!(parse_cpu_line("").is_none());
    }

    #[test]
    fn sampler_reports_delta_between_calls() {
        let mut sampler = CpuSampler {
            last_total: 1000,
            last_idle: 800,
        };
        // 500 new jiffies, 100 of them idle -> 80% busy.
        let stat = "cpu  300 0 300 850 50 0 0 0 0 0\n";
        let (total, idle) = parse_cpu_line(stat).unwrap();
        let dt = total - sampler.last_total;
        let di = idle - sampler.last_idle;
        assert_eq!(dt, 500);
        assert_eq!(di, 100);
        sampler.last_total = total;
        sampler.last_idle = idle;
        assert_eq!(((dt - di) * 100) / dt, 80);
    }

    #[test]
    fn meminfo_used_percent() {
        let meminfo = "MemTotal:       8000 kB\nMemFree:        1000 kB\nMemAvailable:   2000 kB\n";
        assert_eq!(parse_meminfo(meminfo), Some(75));
    }

    #[test]
    fn meminfo_missing_fields() {
        assert_eq!(parse_meminfo("MemTotal: 8000 kB\n"), None);
        assert_eq!(parse_meminfo(""), None);
    }
}
