//! Memory usage from page counts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use sysinfo::System;

use super::{read_trimmed, Derivation, RawReader};
use crate::constants::ONE_GIB;
use crate::error::SourceError;
use crate::models::{MemoryStats, MetricId, SourceKind, StatsSnapshot};

/// Page counts that make up "used" memory, plus physical total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReading {
    pub active_pages: u64,
    pub wired_pages: u64,
    pub compressed_pages: u64,
    pub page_size: u64,
    pub total_bytes: u64,
}

impl MemoryReading {
    pub fn used_bytes(&self) -> u64 {
        self.active_pages
            .saturating_add(self.wired_pages)
            .saturating_add(self.compressed_pages)
            .saturating_mul(self.page_size)
    }
}

/// Instantaneous; no counter state.
#[derive(Debug, Default)]
pub struct MemoryRule;

impl Derivation for MemoryRule {
    type Raw = MemoryReading;
    type Value = MemoryStats;

    fn kind(&self) -> SourceKind {
        SourceKind::Memory
    }

    fn baseline(&self) -> MemoryStats {
        MemoryStats::default()
    }

    fn derive(&mut self, raw: MemoryReading, _elapsed: Option<Duration>) -> Option<MemoryStats> {
        if raw.total_bytes == 0 {
            return None;
        }
        let used = raw.used_bytes() as f64;
        let total = raw.total_bytes as f64;
        Some(MemoryStats {
            usage_percent: (used / total * 100.0).clamp(0.0, 100.0),
            used_gb: used / ONE_GIB,
            total_gb: total / ONE_GIB,
        })
    }

    fn publish(&self, value: &MemoryStats, snapshot: &mut StatsSnapshot) {
        snapshot.memory = value.clone();
    }

    fn history_points(&self, value: &MemoryStats) -> Vec<(MetricId, f64)> {
        vec![(MetricId::MemoryUsage, value.usage_percent)]
    }
}

/// Reads `/proc/meminfo` for page classes and sysinfo for the physical total.
///
/// Linux has no "wired" or "compressed" class; kernel memory that can never
/// be reclaimed stands in for wired and zswap for compressed.
pub struct MeminfoReader {
    path: PathBuf,
    sys: System,
    page_size: u64,
}

impl MeminfoReader {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/proc/meminfo"),
            sys: System::new(),
            page_size: page_size(),
        }
    }
}

impl Default for MeminfoReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RawReader<MemoryReading> for MeminfoReader {
    fn read(&mut self) -> Result<MemoryReading, SourceError> {
        let content = read_trimmed(&self.path)?;
        let fields = parse_meminfo(&content);
        if fields.is_empty() {
            return Err(SourceError::parse("/proc/meminfo", "no fields"));
        }

        self.sys.refresh_memory();
        let total_bytes = self.sys.total_memory();
        if total_bytes == 0 {
            return Err(SourceError::Unavailable("physical memory total"));
        }

        Ok(reading_from_meminfo(&fields, self.page_size, total_bytes))
    }
}

/// Page size in bytes, 4 KiB if sysconf does not know.
fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// Parse `Key:   1234 kB` lines into bytes.
fn parse_meminfo(content: &str) -> HashMap<String, u64> {
    content
        .lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some((key.trim().to_string(), kb * 1024))
        })
        .collect()
}

fn reading_from_meminfo(
    fields: &HashMap<String, u64>,
    page_size: u64,
    total_bytes: u64,
) -> MemoryReading {
    let bytes = |key: &str| fields.get(key).copied().unwrap_or(0);
    let pages = |b: u64| b / page_size.max(1);

    let wired = ["Unevictable", "KernelStack", "PageTables", "SUnreclaim"]
        .into_iter()
        .map(|k| bytes(k))
        .sum::<u64>();

    MemoryReading {
        active_pages: pages(bytes("Active")),
        wired_pages: pages(wired),
        compressed_pages: pages(bytes("Zswap")),
        page_size,
        total_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_from_pages() {
        let mut rule = MemoryRule;
        let stats = rule
            .derive(
                MemoryReading {
                    active_pages: 262_144,
                    wired_pages: 131_072,
                    compressed_pages: 131_072,
                    page_size: 4096,
                    total_bytes: 8 * 1_073_741_824,
                },
                None,
            )
            .expect("derived");
        assert_eq!(stats.used_gb, 2.0);
        assert_eq!(stats.total_gb, 8.0);
        assert_eq!(stats.usage_percent, 25.0);
    }

    #[test]
    fn zero_total_is_suppressed() {
        let mut rule = MemoryRule;
        assert!(rule.derive(MemoryReading::default(), None).is_none());
    }

    #[test]
    fn meminfo_mapping() {
        let content = "MemTotal:       16384000 kB\n\
                       Active:            40960 kB\n\
                       Unevictable:        4096 kB\n\
                       KernelStack:        4096 kB\n\
                       PageTables:         4096 kB\n\
                       SUnreclaim:         4096 kB\n\
                       Zswap:              8192 kB\n\
                       HugePages_Total:       0\n";
        let fields = parse_meminfo(content);
        assert_eq!(fields["Active"], 40960 * 1024);
        assert_eq!(fields["HugePages_Total"], 0);

        let reading = reading_from_meminfo(&fields, 4096, 1 << 30);
        assert_eq!(reading.active_pages, 10240);
        assert_eq!(reading.wired_pages, 4096);
        assert_eq!(reading.compressed_pages, 2048);
        assert_eq!(reading.used_bytes(), (10240 + 4096 + 2048) * 4096);
    }

    #[test]
    fn missing_zswap_reads_as_zero() {
        let fields = parse_meminfo("Active: 4 kB\n");
        let reading = reading_from_meminfo(&fields, 4096, 1 << 30);
        assert_eq!(reading.compressed_pages, 0);
        assert_eq!(reading.active_pages, 1);
    }
}
