//! CPU busy percentage from cumulative tick counters.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use super::{read_trimmed, Derivation, RawReader};
use crate::error::SourceError;
use crate::models::{CpuStats, MetricId, SourceKind, StatsSnapshot};

/// Cumulative CPU ticks per category since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub nice: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuReading {
    pub ticks: CpuTicks,
    pub physical_cores: usize,
    pub logical_cores: usize,
}

/// Counter state: the ticks seen on the previous cycle.
#[derive(Debug, Default)]
pub struct CpuRule {
    previous: Option<CpuTicks>,
}

impl Derivation for CpuRule {
    type Raw = CpuReading;
    type Value = CpuStats;

    fn kind(&self) -> SourceKind {
        SourceKind::Cpu
    }

    fn baseline(&self) -> CpuStats {
        CpuStats::default()
    }

    fn derive(&mut self, raw: CpuReading, _elapsed: Option<Duration>) -> Option<CpuStats> {
        let prev = self.previous.replace(raw.ticks)?;
        let cur = raw.ticks;

        // Counters that went backwards contribute nothing
        let user = cur.user.saturating_sub(prev.user);
        let system = cur.system.saturating_sub(prev.system);
        let idle = cur.idle.saturating_sub(prev.idle);
        let nice = cur.nice.saturating_sub(prev.nice);

        let busy = user.saturating_add(system).saturating_add(nice);
        let total = busy.saturating_add(idle);
        if total == 0 {
            return None;
        }

        let usage = (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
        Some(CpuStats {
            usage_percent: usage,
            physical_cores: raw.physical_cores,
            logical_cores: raw.logical_cores,
        })
    }

    fn publish(&self, value: &CpuStats, snapshot: &mut StatsSnapshot) {
        snapshot.cpu = value.clone();
    }

    fn history_points(&self, value: &CpuStats) -> Vec<(MetricId, f64)> {
        vec![(MetricId::CpuUsage, value.usage_percent)]
    }
}

/// Reads `/proc/stat` and `/proc/cpuinfo`.
pub struct ProcStatReader {
    stat_path: PathBuf,
    physical_cores: Option<usize>,
}

impl ProcStatReader {
    pub fn new() -> Self {
        let physical_cores = std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|s| count_physical_cores(&s));
        Self {
            stat_path: PathBuf::from("/proc/stat"),
            physical_cores,
        }
    }
}

impl Default for ProcStatReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RawReader<CpuReading> for ProcStatReader {
    fn read(&mut self) -> Result<CpuReading, SourceError> {
        let content = read_trimmed(&self.stat_path)?;
        let ticks = parse_proc_stat(&content)
            .ok_or_else(|| SourceError::parse("/proc/stat", "no aggregate cpu line"))?;
        let logical_cores = count_logical_cores(&content);
        Ok(CpuReading {
            ticks,
            physical_cores: self.physical_cores.unwrap_or(logical_cores),
            logical_cores,
        })
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// iowait counts as idle; irq and softirq count as system time.
pub fn parse_proc_stat(content: &str) -> Option<CpuTicks> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if fields.len() < 4 {
        return None;
    }
    let field = |i: usize| fields.get(i).copied().unwrap_or(0);

    Some(CpuTicks {
        user: field(0),
        nice: field(1),
        system: field(2).saturating_add(field(5)).saturating_add(field(6)),
        idle: field(3).saturating_add(field(4)),
    })
}

/// Number of per-core `cpuN` lines.
fn count_logical_cores(content: &str) -> usize {
    content
        .lines()
        .filter(|l| {
            l.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .count()
}

/// Distinct (physical id, core id) pairs in `/proc/cpuinfo`.
fn count_physical_cores(cpuinfo: &str) -> Option<usize> {
    let mut cores = HashSet::new();
    let mut physical_id = None;

    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => physical_id = value.trim().parse::<u32>().ok(),
            "core id" => {
                if let Ok(core) = value.trim().parse::<u32>() {
                    cores.insert((physical_id.unwrap_or(0), core));
                }
            }
            _ => {}
        }
    }

    if cores.is_empty() {
        None
    } else {
        Some(cores.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(user: u64, system: u64, idle: u64, nice: u64) -> CpuReading {
        CpuReading {
            ticks: CpuTicks {
                user,
                system,
                idle,
                nice,
            },
            physical_cores: 2,
            logical_cores: 4,
        }
    }

    #[test]
    fn first_sample_is_suppressed() {
        let mut rule = CpuRule::default();
        assert!(rule.derive(ticks(100, 50, 800, 0), None).is_none());
    }

    #[test]
    fn busy_percentage_from_deltas() {
        let mut rule = CpuRule::default();
        rule.derive(ticks(0, 0, 0, 0), None);
        let stats = rule.derive(ticks(10, 5, 85, 0), None).expect("delta");
        assert_eq!(stats.usage_percent, 15.0);
        assert_eq!(stats.logical_cores, 4);
    }

    #[test]
    fn stalled_counters_emit_nothing() {
        let mut rule = CpuRule::default();
        rule.derive(ticks(0, 0, 0, 0), None);
        rule.derive(ticks(10, 5, 85, 0), None);
        assert!(rule.derive(ticks(10, 5, 85, 0), None).is_none());
    }

    #[test]
    fn nice_counts_as_busy() {
        let mut rule = CpuRule::default();
        rule.derive(ticks(0, 0, 0, 0), None);
        let stats = rule.derive(ticks(0, 0, 50, 50), None).expect("delta");
        assert_eq!(stats.usage_percent, 50.0);
    }

    #[test]
    fn always_within_bounds() {
        let mut rule = CpuRule::default();
        let samples = [
            (0, 0, 0, 0),
            (1000, 0, 0, 0),
            (500, 10, 3, 0),
            (u64::MAX / 4, 0, 0, 7),
            (0, 0, 100, 0),
            (5, 5, 5, 5),
        ];
        for (u, s, i, n) in samples {
            if let Some(stats) = rule.derive(ticks(u, s, i, n), None) {
                assert!(stats.usage_percent.is_finite());
                assert!((0.0..=100.0).contains(&stats.usage_percent));
            }
        }
    }

    #[test]
    fn counter_regression_is_zero_delta() {
        let mut rule = CpuRule::default();
        rule.derive(ticks(500, 500, 500, 0), None);
        // user went backwards, idle advanced
        let stats = rule.derive(ticks(100, 500, 600, 0), None).expect("delta");
        assert_eq!(stats.usage_percent, 0.0);
    }

    #[test]
    fn parse_proc_stat_folds_categories() {
        let content = "cpu  100 20 300 4000 50 6 7 8 0 0\n\
                       cpu0 50 10 150 2000 25 3 3 4 0 0\n\
                       cpu1 50 10 150 2000 25 3 4 4 0 0\n\
                       intr 12345\n";
        let ticks = parse_proc_stat(content).expect("parse");
        assert_eq!(
            ticks,
            CpuTicks {
                user: 100,
                nice: 20,
                system: 313,
                idle: 4050,
            }
        );
        assert_eq!(count_logical_cores(content), 2);
    }

    #[test]
    fn parse_proc_stat_rejects_garbage() {
        assert!(parse_proc_stat("").is_none());
        assert!(parse_proc_stat("cpu  1 2\n").is_none());
        assert!(parse_proc_stat("cpu  a b c d\n").is_none());
    }

    #[test]
    fn physical_cores_from_cpuinfo() {
        let cpuinfo = "processor\t: 0\nphysical id\t: 0\ncore id\t: 0\n\n\
                       processor\t: 1\nphysical id\t: 0\ncore id\t: 1\n\n\
                       processor\t: 2\nphysical id\t: 0\ncore id\t: 0\n\n\
                       processor\t: 3\nphysical id\t: 0\ncore id\t: 1\n";
        assert_eq!(count_physical_cores(cpuinfo), Some(2));
        assert_eq!(count_physical_cores("processor : 0\n"), None);
    }
}
