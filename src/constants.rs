//! Application-wide constants.
//!
//! Centralizes sampling defaults, hardware ranges, thresholds and paths
//! so the sources and the config layer agree on the same numbers.

use std::path::PathBuf;

// ── Timing ────────────────────────────────────────────────────────
/// Minimum allowed sampling interval (ms).
pub const MIN_INTERVAL_MS: u64 = 100;
/// Default sampling interval (ms).
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
/// Default latency probe interval (ms).
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 2000;
/// Default latency probe timeout (ms).
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
/// Minimum latency probe timeout (ms).
pub const MIN_PROBE_TIMEOUT_MS: u64 = 50;

// ── Capacities ────────────────────────────────────────────────────
/// Default history depth (samples per metric).
pub const DEFAULT_HISTORY_DEPTH: usize = 60;
/// Largest accepted history depth.
pub const MAX_HISTORY_DEPTH: usize = 3600;
/// Baseline value used to pre-fill history windows.
pub const HISTORY_BASELINE: f64 = 0.0;
/// Number of recent probe attempts used for packet loss.
pub const DEFAULT_PROBE_WINDOW: usize = 20;

// ── Units ─────────────────────────────────────────────────────────
/// 1 GiB in bytes.
pub const ONE_GIB: f64 = 1_073_741_824.0;

// ── Hardware ranges ───────────────────────────────────────────────
/// Wi-Fi link rate range used for history graphs (Mbps).
pub const LINK_RATE_RANGE: (f64, f64) = (1.0, 150.0);
/// Radio signal range used for history graphs (dBm).
pub const DBM_RANGE: (f64, f64) = (-120.0, -30.0);
/// `/proc/net/wireless` reports this when the noise floor is unknown.
pub const NOISE_UNAVAILABLE_DBM: f64 = -256.0;

// ── Thermal bands ─────────────────────────────────────────────────
/// Hottest zone temperature at which pressure becomes "Fair" (Celsius).
pub const THERMAL_FAIR_C: f64 = 80.0;
/// Hottest zone temperature at which pressure becomes "Serious" (Celsius).
pub const THERMAL_SERIOUS_C: f64 = 90.0;
/// Hottest zone temperature at which pressure becomes "Critical" (Celsius).
pub const THERMAL_CRITICAL_C: f64 = 100.0;
/// Maximum thermal zone index to probe.
pub const MAX_THERMAL_ZONES: u32 = 16;

// ── Tip thresholds ────────────────────────────────────────────────
/// RSSI below which the signal counts as weak (dBm).
pub const WEAK_SIGNAL_DBM: f64 = -75.0;
/// Link rate below which the link counts as slow (Mbps).
pub const LOW_LINK_RATE_MBPS: f64 = 50.0;
/// Noise floor above which interference is reported (dBm).
pub const HIGH_NOISE_DBM: f64 = -85.0;
/// Router packet loss above which the connection counts as unstable (%).
pub const UNSTABLE_LOSS_PCT: f64 = 1.0;
/// Router jitter above which calls may be choppy (ms).
pub const HIGH_JITTER_MS: f64 = 50.0;

// ── Usage color thresholds ────────────────────────────────────────
/// CPU and memory usage above which the readout turns red (%).
pub const USAGE_CRITICAL_PCT: f64 = 80.0;
/// Disk usage above which the readout turns red (%).
pub const DISK_CRITICAL_PCT: f64 = 90.0;
/// Battery level below which the readout is a warning (%).
pub const BATTERY_LOW_PCT: f64 = 20.0;

// ── Probe targets ─────────────────────────────────────────────────
/// Internet latency target.
pub const DEFAULT_INTERNET_TARGET: &str = "1.1.1.1:443";
/// Port used when probing the default gateway.
pub const ROUTER_PROBE_PORT: u16 = 80;
/// Port used when probing the DNS server.
pub const DNS_PROBE_PORT: u16 = 53;

// ── Prometheus Metrics ────────────────────────────────────────────
/// Prometheus metrics output buffer initial capacity.
pub const PROM_BUFFER_CAPACITY: usize = 4096;

// ── Paths ─────────────────────────────────────────────────────────

/// Returns the user's home directory, falling back to /tmp.
pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

/// Returns `~/.config/netbar/`.
pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join("netbar")
}

/// Returns `~/.config/netbar/config.toml`.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}
