use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::constants::*;
use crate::error::ConfigError;
use crate::models::SourceKind;
use crate::probe::ProbeSettings;

/// Sampler configuration with sensible defaults.
///
/// Can be overridden via ~/.config/netbar/config.toml
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Sampling interval in milliseconds
    pub interval_ms: u64,
    /// Samples kept per metric history window
    pub history_depth: usize,
    /// Sources that are sampled; the rest keep their baseline
    pub enabled: BTreeSet<SourceKind>,
    /// Latency probe settings
    pub probes: ProbeConfig,
    /// Wireless interface to read (first one listed when unset)
    pub wireless_interface: Option<String>,
    /// Network interface to count (all non-loopback when unset)
    pub network_interface: Option<String>,
    /// Address for the Prometheus endpoint (disabled when unset)
    pub prometheus_addr: Option<String>,
}

/// Latency probe targets and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// Router target; discovered from the routing table when unset.
    pub router: Option<String>,
    /// DNS target; first resolv.conf nameserver when unset.
    pub dns: Option<String>,
    pub internet: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    /// Attempts counted for packet loss.
    pub window: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            router: None,
            dns: None,
            internet: DEFAULT_INTERNET_TARGET.to_string(),
            interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            window: DEFAULT_PROBE_WINDOW,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            history_depth: DEFAULT_HISTORY_DEPTH,
            enabled: SourceKind::ALL.into_iter().collect(),
            probes: ProbeConfig::default(),
            wireless_interface: None,
            network_interface: None,
            prometheus_addr: None,
        }
    }
}

/// TOML-deserializable config file format.
/// All fields are optional; missing fields use defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    interval_ms: Option<u64>,
    history_depth: Option<usize>,
    /// Source names to sample, e.g. ["cpu", "memory", "router"]
    sources: Option<Vec<String>>,
    wireless_interface: Option<String>,
    network_interface: Option<String>,
    prometheus_addr: Option<String>,
    probes: Option<FileProbeConfig>,
}

/// TOML-deserializable probe config section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileProbeConfig {
    router: Option<String>,
    dns: Option<String>,
    internet: Option<String>,
    interval_ms: Option<u64>,
    timeout_ms: Option<u64>,
    window: Option<usize>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Config {
    /// Load config from ~/.config/netbar/config.toml, falling back to defaults
    /// for any missing fields. If the file doesn't exist, returns pure defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let content = match std::fs::read_to_string(&config_path) {
            Ok(c) => c,
            Err(_) => return Config::default(), // No config file, use defaults
        };

        match Self::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %config_path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Config::default()
            }
        }
    }

    /// Load an explicitly requested config file. Unlike [`Config::load`],
    /// a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML and merge it over the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file_config: FileConfig = toml::from_str(content)?;
        Ok(Config::default().merge(file_config))
    }

    fn merge(mut self, file_config: FileConfig) -> Self {
        if let Some(v) = file_config.interval_ms {
            self.interval_ms = v.max(MIN_INTERVAL_MS);
        }
        if let Some(v) = file_config.history_depth {
            self.history_depth = v.clamp(1, MAX_HISTORY_DEPTH);
        }
        if let Some(names) = file_config.sources {
            let mut enabled = BTreeSet::new();
            for name in &names {
                match SourceKind::from_name(name) {
                    Some(kind) => {
                        enabled.insert(kind);
                    }
                    None => warn!(source = %name, "unknown source in config, ignoring"),
                }
            }
            if !enabled.is_empty() {
                self.enabled = enabled;
            }
        }
        if let Some(v) = non_empty(file_config.wireless_interface) {
            self.wireless_interface = Some(v);
        }
        if let Some(v) = non_empty(file_config.network_interface) {
            self.network_interface = Some(v);
        }
        if let Some(v) = non_empty(file_config.prometheus_addr) {
            self.prometheus_addr = Some(v);
        }

        // Merge probe config
        if let Some(p) = file_config.probes {
            if let Some(v) = non_empty(p.router) {
                self.probes.router = Some(v);
            }
            if let Some(v) = non_empty(p.dns) {
                self.probes.dns = Some(v);
            }
            if let Some(v) = non_empty(p.internet) {
                self.probes.internet = v;
            }
            if let Some(v) = p.interval_ms {
                self.probes.interval_ms = v.max(MIN_INTERVAL_MS);
            }
            if let Some(v) = p.timeout_ms {
                self.probes.timeout_ms = v.max(MIN_PROBE_TIMEOUT_MS);
            }
            if let Some(v) = p.window {
                self.probes.window = v.max(1);
            }
        }

        self
    }

    /// Override the interval (e.g. from the command line), respecting the floor.
    pub fn set_interval_ms(&mut self, ms: u64) {
        self.interval_ms = ms.max(MIN_INTERVAL_MS);
    }

    /// Override the history depth, respecting the bounds.
    pub fn set_history_depth(&mut self, depth: usize) {
        self.history_depth = depth.clamp(1, MAX_HISTORY_DEPTH);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            interval: Duration::from_millis(self.probes.interval_ms),
            timeout: Duration::from_millis(self.probes.timeout_ms),
            window: self.probes.window,
        }
    }
}
