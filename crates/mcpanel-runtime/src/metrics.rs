//! Host resource metrics

use chrono::{TimeZone, Utc};
use mcpanel_core::constants;
use std::path::Path;
use sysinfo::{Disks, System};

#[derive(Debug, Clone, PartialEq)]
pub struct HostMetrics {
    /// Mean usage across all cores, in percent
    pub cpu_usage: f64,
    pub cpu_cores: usize,
    pub mem_percent: f64,
    /// Usage of the filesystem holding `/`
    pub disk_percent: f64,
    pub boot_time: String,
}

/// Keeps one `System` around so CPU usage has a previous sample to diff
/// against; the first reading after creation is 0.
pub struct HostSampler {
    system: System,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self { system }
    }

    pub fn sample(&mut self) -> HostMetrics {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64
        };

        HostMetrics {
            cpu_usage: round2(cpu_usage),
            cpu_cores: cpus.len(),
            mem_percent: round2(percent(self.system.used_memory(), self.system.total_memory())),
            disk_percent: round2(root_disk_percent()),
            boot_time: format_boot_time(System::boot_time()),
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn root_disk_percent() -> f64 {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first())
        .map(|d| percent(d.total_space().saturating_sub(d.available_space()), d.total_space()))
        .unwrap_or(0.0)
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn format_boot_time(secs: u64) -> String {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .map(|t| t.format(constants::DB_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 25.0);
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(round2(33.33333), 33.33);
    }

    #[test]
    fn test_format_boot_time() {
        assert_eq!(format_boot_time(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_sample_ranges() {
        let mut sampler = HostSampler::new();
        let metrics = sampler.sample();

        assert!(metrics.cpu_cores >= 1);
        assert!((0.0..=100.0).contains(&metrics.cpu_usage));
        assert!((0.0..=100.0).contains(&metrics.mem_percent));
        assert!((0.0..=100.0).contains(&metrics.disk_percent));
        assert!(!metrics.boot_time.is_empty());
    }
}
