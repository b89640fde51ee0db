use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{MetricId, SourceKind};
use crate::history::{HistoryBuffer, HistoryWindow};

/// Everything the sampler produced in one cycle.
///
/// Built fresh on every tick and never mutated after publication, so a
/// consumer holding one always sees values from a single cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Completed cycles so far; 0 for the startup baseline.
    pub cycle: u64,
    pub taken_at: DateTime<Utc>,
    /// When the sampler was created.
    pub started_at: DateTime<Utc>,
    /// Whole seconds from `started_at` to `taken_at`.
    pub uptime_secs: u64,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub battery: BatteryStats,
    pub thermal: ThermalStats,
    pub network: NetworkStats,
    pub wireless: WirelessStats,
    pub router: LatencyStats,
    pub dns: LatencyStats,
    pub internet: LatencyStats,
    /// Addresses the latency sources probe.
    pub targets: ProbeTargets,
    /// Sources whose value was retained from an earlier cycle.
    pub stale: BTreeSet<SourceKind>,
    /// Frozen history window per metric, oldest sample first.
    pub history: BTreeMap<MetricId, HistoryWindow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuStats {
    /// Busy percentage, 0-100.
    pub usage_percent: f64,
    pub physical_cores: usize,
    pub logical_cores: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    pub usage_percent: f64,
    pub used_gb: f64,
    pub total_gb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiskStats {
    pub usage_percent: f64,
    pub free_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryStats {
    pub level_percent: f64,
    pub charging: bool,
    /// Minutes until empty, -1 when unknown (on AC power, no battery).
    pub minutes_remaining: i64,
}

impl Default for BatteryStats {
    fn default() -> Self {
        Self {
            level_percent: 0.0,
            charging: false,
            minutes_remaining: -1,
        }
    }
}

/// Discrete thermal pressure reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ThermalPressure {
    #[default]
    Normal,
    Fair,
    Serious,
    Critical,
    Unknown,
}

impl ThermalPressure {
    /// Ordinal severity so pressure can be graphed next to percentages.
    /// Unknown states count as normal.
    pub fn level(self) -> f64 {
        match self {
            ThermalPressure::Normal | ThermalPressure::Unknown => 0.0,
            ThermalPressure::Fair => 33.0,
            ThermalPressure::Serious => 66.0,
            ThermalPressure::Critical => 100.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThermalPressure::Normal | ThermalPressure::Unknown => "Normal",
            ThermalPressure::Fair => "Fair",
            ThermalPressure::Serious => "Serious",
            ThermalPressure::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThermalStats {
    pub pressure: ThermalPressure,
    /// 0 / 33 / 66 / 100.
    pub level: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    /// Receive rate, bytes per second.
    pub download_bps: f64,
    /// Transmit rate, bytes per second.
    pub upload_bps: f64,
    /// Bytes received since the sampler started.
    pub total_downloaded: u64,
    /// Bytes sent since the sampler started.
    pub total_uploaded: u64,
}

/// Radio readings as reported; 0 means "not populated yet".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WirelessStats {
    pub link_rate_mbps: f64,
    pub rssi_dbm: f64,
    pub noise_dbm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub rtt_ms: f64,
    /// |current RTT - previous RTT|.
    pub jitter_ms: f64,
    pub loss_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeTargets {
    pub router: Option<SocketAddr>,
    pub dns: Option<SocketAddr>,
    pub internet: Option<SocketAddr>,
}

impl StatsSnapshot {
    /// The snapshot consumers see before the first cycle completes:
    /// every metric at its baseline and every window `depth` zeros.
    pub fn baseline(depth: usize) -> Self {
        let history = MetricId::ALL
            .into_iter()
            .map(|id| (id, HistoryBuffer::new(depth).freeze()))
            .collect();
        Self::with_history(0, history)
    }

    /// Snapshot of cycle `cycle` with every section at its baseline.
    pub fn with_history(cycle: u64, history: BTreeMap<MetricId, HistoryWindow>) -> Self {
        let now = Utc::now();
        Self {
            cycle,
            taken_at: now,
            started_at: now,
            uptime_secs: 0,
            cpu: CpuStats::default(),
            memory: MemoryStats::default(),
            disk: DiskStats::default(),
            battery: BatteryStats::default(),
            thermal: ThermalStats::default(),
            network: NetworkStats::default(),
            wireless: WirelessStats::default(),
            router: LatencyStats::default(),
            dns: LatencyStats::default(),
            internet: LatencyStats::default(),
            targets: ProbeTargets::default(),
            stale: BTreeSet::new(),
            history,
        }
    }

    /// Record the sampler start time and derive the uptime from it.
    pub fn set_started_at(&mut self, started_at: DateTime<Utc>) {
        self.started_at = started_at;
        self.uptime_secs = (self.taken_at - started_at).num_seconds().max(0) as u64;
    }

    /// Latest derived value of a metric.
    pub fn value(&self, id: MetricId) -> f64 {
        match id {
            MetricId::CpuUsage => self.cpu.usage_percent,
            MetricId::MemoryUsage => self.memory.usage_percent,
            MetricId::DiskUsage => self.disk.usage_percent,
            MetricId::BatteryLevel => self.battery.level_percent,
            MetricId::ThermalPressure => self.thermal.level,
            MetricId::NetDownload => self.network.download_bps,
            MetricId::NetUpload => self.network.upload_bps,
            MetricId::NetTotal => self.network.download_bps + self.network.upload_bps,
            MetricId::LinkRate => self.wireless.link_rate_mbps,
            MetricId::Rssi => self.wireless.rssi_dbm,
            MetricId::Noise => self.wireless.noise_dbm,
            MetricId::RouterPing => self.router.rtt_ms,
            MetricId::RouterJitter => self.router.jitter_ms,
            MetricId::RouterLoss => self.router.loss_percent,
            MetricId::DnsPing => self.dns.rtt_ms,
            MetricId::DnsJitter => self.dns.jitter_ms,
            MetricId::InternetPing => self.internet.rtt_ms,
            MetricId::InternetJitter => self.internet.jitter_ms,
        }
    }

    /// History window of a metric by id.
    pub fn history(&self, id: MetricId) -> Option<HistoryWindow> {
        self.history.get(&id).cloned()
    }

    /// History window of a metric by its snake_case name.
    pub fn history_for(&self, name: &str) -> Option<HistoryWindow> {
        MetricId::from_name(name).and_then(|id| self.history(id))
    }

    pub fn is_stale(&self, kind: SourceKind) -> bool {
        self.stale.contains(&kind)
    }
}
