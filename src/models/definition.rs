use serde::Serialize;

use crate::constants::*;

/// Every graphable metric the sampler keeps a history window for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    CpuUsage,
    MemoryUsage,
    DiskUsage,
    BatteryLevel,
    ThermalPressure,
    NetDownload,
    NetUpload,
    NetTotal,
    LinkRate,
    Rssi,
    Noise,
    RouterPing,
    RouterJitter,
    RouterLoss,
    DnsPing,
    DnsJitter,
    InternetPing,
    InternetJitter,
}

impl MetricId {
    pub const ALL: [MetricId; 18] = [
        MetricId::CpuUsage,
        MetricId::MemoryUsage,
        MetricId::DiskUsage,
        MetricId::BatteryLevel,
        MetricId::ThermalPressure,
        MetricId::NetDownload,
        MetricId::NetUpload,
        MetricId::NetTotal,
        MetricId::LinkRate,
        MetricId::Rssi,
        MetricId::Noise,
        MetricId::RouterPing,
        MetricId::RouterJitter,
        MetricId::RouterLoss,
        MetricId::DnsPing,
        MetricId::DnsJitter,
        MetricId::InternetPing,
        MetricId::InternetJitter,
    ];

    /// Static descriptor of this metric.
    pub fn definition(self) -> &'static MetricDefinition {
        // DEFINITIONS is declared in the same order as the enum.
        &DEFINITIONS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }

    /// Look a metric up by its snake_case name.
    pub fn from_name(name: &str) -> Option<Self> {
        DEFINITIONS.iter().find(|d| d.name == name).map(|d| d.id)
    }
}

/// Sampled source families. Latency is split per probe target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Cpu,
    Memory,
    Disk,
    Battery,
    Thermal,
    Network,
    Wireless,
    Router,
    Dns,
    Internet,
}

impl SourceKind {
    pub const ALL: [SourceKind; 10] = [
        SourceKind::Cpu,
        SourceKind::Memory,
        SourceKind::Disk,
        SourceKind::Battery,
        SourceKind::Thermal,
        SourceKind::Network,
        SourceKind::Wireless,
        SourceKind::Router,
        SourceKind::Dns,
        SourceKind::Internet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Cpu => "cpu",
            SourceKind::Memory => "memory",
            SourceKind::Disk => "disk",
            SourceKind::Battery => "battery",
            SourceKind::Thermal => "thermal",
            SourceKind::Network => "network",
            SourceKind::Wireless => "wireless",
            SourceKind::Router => "router",
            SourceKind::Dns => "dns",
            SourceKind::Internet => "internet",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Metrics whose history this source feeds.
    pub fn metrics(self) -> &'static [MetricId] {
        match self {
            SourceKind::Cpu => &[MetricId::CpuUsage],
            SourceKind::Memory => &[MetricId::MemoryUsage],
            SourceKind::Disk => &[MetricId::DiskUsage],
            SourceKind::Battery => &[MetricId::BatteryLevel],
            SourceKind::Thermal => &[MetricId::ThermalPressure],
            SourceKind::Network => &[
                MetricId::NetDownload,
                MetricId::NetUpload,
                MetricId::NetTotal,
            ],
            SourceKind::Wireless => &[MetricId::LinkRate, MetricId::Rssi, MetricId::Noise],
            SourceKind::Router => &[
                MetricId::RouterPing,
                MetricId::RouterJitter,
                MetricId::RouterLoss,
            ],
            SourceKind::Dns => &[MetricId::DnsPing, MetricId::DnsJitter],
            SourceKind::Internet => &[MetricId::InternetPing, MetricId::InternetJitter],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Percent,
    BytesPerSecond,
    Mbps,
    Dbm,
    Milliseconds,
    /// Ordinal 0-100 severity level.
    Level,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Percent | Unit::Level => "%",
            Unit::BytesPerSecond => "B/s",
            Unit::Mbps => "Mbps",
            Unit::Dbm => "dBm",
            Unit::Milliseconds => "ms",
        }
    }
}

/// Which side of a threshold is the bad one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsWorse,
    LowerIsWorse,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

/// Static descriptor of one metric. Configuration, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct MetricDefinition {
    pub id: MetricId,
    pub name: &'static str,
    pub help: &'static str,
    pub unit: Unit,
    /// Valid range; history samples are clamped into it.
    pub range: (f64, f64),
    pub thresholds: Option<Thresholds>,
    /// 0.0 means "not populated yet" rather than a real reading.
    pub zero_is_unset: bool,
}

impl MetricDefinition {
    /// Clamp a sample into the valid range. NaN becomes the range minimum.
    /// The unset sentinel passes through untouched.
    pub fn clamp(&self, value: f64) -> f64 {
        if self.zero_is_unset && value == 0.0 {
            return 0.0;
        }
        if value.is_nan() {
            return self.range.0;
        }
        value.clamp(self.range.0, self.range.1)
    }

    /// Classify a value against the warning/critical thresholds.
    pub fn severity(&self, value: f64) -> Severity {
        let Some(t) = self.thresholds else {
            return Severity::Normal;
        };
        if self.zero_is_unset && value == 0.0 {
            return Severity::Normal;
        }
        let beyond = |limit: f64| match t.direction {
            Direction::HigherIsWorse => value >= limit,
            Direction::LowerIsWorse => value <= limit,
        };
        if beyond(t.critical) {
            Severity::Critical
        } else if beyond(t.warning) {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

const fn higher(warning: f64, critical: f64) -> Option<Thresholds> {
    Some(Thresholds {
        warning,
        critical,
        direction: Direction::HigherIsWorse,
    })
}

const fn lower(warning: f64, critical: f64) -> Option<Thresholds> {
    Some(Thresholds {
        warning,
        critical,
        direction: Direction::LowerIsWorse,
    })
}

const PERCENT: (f64, f64) = (0.0, 100.0);
const RATE: (f64, f64) = (0.0, f64::MAX);
const MILLIS: (f64, f64) = (0.0, 60_000.0);

const fn def(
    id: MetricId,
    name: &'static str,
    help: &'static str,
    unit: Unit,
    range: (f64, f64),
    thresholds: Option<Thresholds>,
) -> MetricDefinition {
    MetricDefinition {
        id,
        name,
        help,
        unit,
        range,
        thresholds,
        zero_is_unset: false,
    }
}

const fn unset_zero(
    id: MetricId,
    name: &'static str,
    help: &'static str,
    unit: Unit,
    range: (f64, f64),
    thresholds: Option<Thresholds>,
) -> MetricDefinition {
    MetricDefinition {
        id,
        name,
        help,
        unit,
        range,
        thresholds,
        zero_is_unset: true,
    }
}

/// One entry per [`MetricId`], in declaration order.
pub static DEFINITIONS: [MetricDefinition; 18] = [
    def(
        MetricId::CpuUsage,
        "cpu_usage",
        "Busy CPU time percentage.",
        Unit::Percent,
        PERCENT,
        higher(60.0, USAGE_CRITICAL_PCT),
    ),
    def(
        MetricId::MemoryUsage,
        "memory_usage",
        "Memory usage percentage.",
        Unit::Percent,
        PERCENT,
        higher(60.0, USAGE_CRITICAL_PCT),
    ),
    def(
        MetricId::DiskUsage,
        "disk_usage",
        "Root volume usage percentage.",
        Unit::Percent,
        PERCENT,
        higher(80.0, DISK_CRITICAL_PCT),
    ),
    unset_zero(
        MetricId::BatteryLevel,
        "battery_level",
        "Internal battery charge percentage.",
        Unit::Percent,
        PERCENT,
        lower(BATTERY_LOW_PCT, 10.0),
    ),
    def(
        MetricId::ThermalPressure,
        "thermal_pressure",
        "Thermal pressure level (0 normal, 33 fair, 66 serious, 100 critical).",
        Unit::Level,
        PERCENT,
        higher(33.0, 66.0),
    ),
    def(
        MetricId::NetDownload,
        "net_download",
        "Download rate in bytes per second.",
        Unit::BytesPerSecond,
        RATE,
        None,
    ),
    def(
        MetricId::NetUpload,
        "net_upload",
        "Upload rate in bytes per second.",
        Unit::BytesPerSecond,
        RATE,
        None,
    ),
    def(
        MetricId::NetTotal,
        "net_total",
        "Combined download and upload rate in bytes per second.",
        Unit::BytesPerSecond,
        RATE,
        None,
    ),
    unset_zero(
        MetricId::LinkRate,
        "link_rate",
        "Wi-Fi link rate in Mbps.",
        Unit::Mbps,
        LINK_RATE_RANGE,
        lower(LOW_LINK_RATE_MBPS, 10.0),
    ),
    unset_zero(
        MetricId::Rssi,
        "rssi",
        "Wi-Fi signal strength in dBm.",
        Unit::Dbm,
        DBM_RANGE,
        lower(WEAK_SIGNAL_DBM, -85.0),
    ),
    unset_zero(
        MetricId::Noise,
        "noise",
        "Wi-Fi noise floor in dBm.",
        Unit::Dbm,
        DBM_RANGE,
        higher(HIGH_NOISE_DBM, -75.0),
    ),
    def(
        MetricId::RouterPing,
        "router_ping",
        "Round-trip time to the default gateway in ms.",
        Unit::Milliseconds,
        MILLIS,
        higher(20.0, 100.0),
    ),
    def(
        MetricId::RouterJitter,
        "router_jitter",
        "Router round-trip variation in ms.",
        Unit::Milliseconds,
        MILLIS,
        higher(30.0, HIGH_JITTER_MS),
    ),
    def(
        MetricId::RouterLoss,
        "router_loss",
        "Packet loss to the default gateway in percent.",
        Unit::Percent,
        PERCENT,
        higher(UNSTABLE_LOSS_PCT, 5.0),
    ),
    def(
        MetricId::DnsPing,
        "dns_ping",
        "Round-trip time to the DNS server in ms.",
        Unit::Milliseconds,
        MILLIS,
        higher(50.0, 100.0),
    ),
    def(
        MetricId::DnsJitter,
        "dns_jitter",
        "DNS round-trip variation in ms.",
        Unit::Milliseconds,
        MILLIS,
        higher(30.0, HIGH_JITTER_MS),
    ),
    def(
        MetricId::InternetPing,
        "internet_ping",
        "Round-trip time to the internet target in ms.",
        Unit::Milliseconds,
        MILLIS,
        higher(100.0, 200.0),
    ),
    def(
        MetricId::InternetJitter,
        "internet_jitter",
        "Internet round-trip variation in ms.",
        Unit::Milliseconds,
        MILLIS,
        higher(30.0, HIGH_JITTER_MS),
    ),
];
