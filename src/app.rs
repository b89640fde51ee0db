//! Application wiring and console loop.
//!
//! Builds the Linux sources for the enabled kinds, starts the latency
//! probers and the optional Prometheus endpoint, then prints one readout
//! per completed cycle until Ctrl-C.

use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use netbar::config::Config;
use netbar::constants::{DNS_PROBE_PORT, ROUTER_PROBE_PORT};
use netbar::error::SourceError;
use netbar::metrics;
use netbar::models::{SourceKind, StatsSnapshot};
use netbar::probe::{self, ProbeHandle};
use netbar::publisher::SnapshotPublisher;
use netbar::sampler::{Sampler, Scheduler};
use netbar::sources::battery::{BatteryRule, PowerSupplyReader};
use netbar::sources::cpu::{CpuRule, ProcStatReader};
use netbar::sources::disk::{DiskRule, VolumeReader};
use netbar::sources::latency::LatencyRule;
use netbar::sources::memory::{MemoryRule, MeminfoReader};
use netbar::sources::network::{InterfaceCounterReader, NetworkRule};
use netbar::sources::thermal::{ThermalRule, ThermalZoneReader};
use netbar::sources::wireless::{ProcWirelessReader, WirelessRule};
use netbar::sources::{MetricSource, Source};
use netbar::tips::{self, Tip};
use netbar::utils::{format_bytes, format_minutes, format_rate};

const INTERNET_DEFAULT_PORT: u16 = 443;

/// Output options picked on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    pub json: bool,
    pub once: bool,
}

pub struct App {
    scheduler: Scheduler,
    mode: OutputMode,
}

impl App {
    /// Must run inside the tokio runtime; probers are spawned here.
    pub fn new(config: &Config, mode: OutputMode) -> Result<Self> {
        let publisher = Arc::new(SnapshotPublisher::new(config.history_depth));
        let mut sampler = Sampler::new(config.history_depth, Arc::clone(&publisher));

        for kind in SourceKind::ALL {
            if config.is_enabled(kind) {
                sampler.register(build_source(kind, config));
            }
        }
        info!(
            sources = ?sampler.registered(),
            interval_ms = config.interval_ms,
            depth = config.history_depth,
            "sampler configured"
        );

        if let Some(addr) = &config.prometheus_addr {
            metrics::start_server(addr, Arc::clone(&publisher)).map_err(anyhow::Error::msg)?;
        }

        Ok(Self {
            scheduler: Scheduler::new(sampler, config.interval()),
            mode,
        })
    }

    pub async fn run(self) -> Result<()> {
        if self.mode.once {
            // Two cycles so delta-based sources have something to report
            self.scheduler.run_cycle_now();
            tokio::time::sleep(self.scheduler.interval()).await;
            let snapshot = self.scheduler.run_cycle_now();
            return self.print(&snapshot);
        }

        self.scheduler.start()?;
        let publisher = Arc::clone(self.scheduler.publisher());
        let mut ticker = tokio::time::interval(self.scheduler.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_cycle = 0;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = ticker.tick() => {
                    let snapshot = publisher.current();
                    if snapshot.cycle != last_cycle {
                        last_cycle = snapshot.cycle;
                        self.print(&snapshot)?;
                    }
                }
            }
        }

        self.scheduler.stop();
        info!(cycles = last_cycle, "shutting down");
        Ok(())
    }

    fn print(&self, snapshot: &StatsSnapshot) -> Result<()> {
        let tips = tips::evaluate(snapshot);
        let mut out = std::io::stdout().lock();
        if self.mode.json {
            let report = Report {
                snapshot,
                tips: &tips,
            };
            let line = serde_json::to_string(&report).context("serializing snapshot")?;
            writeln!(out, "{line}")?;
        } else {
            writeln!(out, "{}", format_summary(snapshot))?;
            for tip in &tips {
                writeln!(out, "  tip: {}", tip.message)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    snapshot: &'a StatsSnapshot,
    tips: &'a [Tip],
}

fn build_source(kind: SourceKind, config: &Config) -> Box<dyn MetricSource> {
    match kind {
        SourceKind::Cpu => Source::new(CpuRule::default(), ProcStatReader::new()).boxed(),
        SourceKind::Memory => Source::new(MemoryRule, MeminfoReader::new()).boxed(),
        SourceKind::Disk => Source::new(DiskRule, VolumeReader::root()).boxed(),
        SourceKind::Battery => Source::new(BatteryRule, PowerSupplyReader::new()).boxed(),
        SourceKind::Thermal => Source::new(ThermalRule, ThermalZoneReader::new()).boxed(),
        SourceKind::Network => Source::new(
            NetworkRule::default(),
            InterfaceCounterReader::new(config.network_interface.clone()),
        )
        .boxed(),
        SourceKind::Wireless => Source::new(
            WirelessRule,
            ProcWirelessReader::new(
                config.wireless_interface.clone(),
                config.interval(),
                Duration::from_millis(config.probes.timeout_ms),
            ),
        )
        .boxed(),
        SourceKind::Router | SourceKind::Dns | SourceKind::Internet => latency_source(kind, config),
    }
}

fn latency_source(kind: SourceKind, config: &Config) -> Box<dyn MetricSource> {
    let rule = LatencyRule::new(kind);
    let label = match kind {
        SourceKind::Router => "router prober",
        SourceKind::Dns => "dns prober",
        _ => "internet prober",
    };

    match probe_target(kind, config) {
        Some(target) => {
            let handle: ProbeHandle = probe::spawn_prober(label, target, config.probe_settings());
            Source::new(rule.with_target(target), handle).boxed()
        }
        None => {
            warn!(source = kind.name(), "no probe target found, source will stay stale");
            Source::new(rule, || Err(SourceError::Unavailable("probe target"))).boxed()
        }
    }
}

fn probe_target(kind: SourceKind, config: &Config) -> Option<SocketAddr> {
    match kind {
        SourceKind::Router => match &config.probes.router {
            Some(target) => probe::resolve_target(target, ROUTER_PROBE_PORT),
            None => probe::default_gateway()
                .map(|ip| SocketAddr::new(IpAddr::V4(ip), ROUTER_PROBE_PORT)),
        },
        SourceKind::Dns => match &config.probes.dns {
            Some(target) => probe::resolve_target(target, DNS_PROBE_PORT),
            None => probe::first_nameserver().map(|ip| SocketAddr::new(ip, DNS_PROBE_PORT)),
        },
        SourceKind::Internet => {
            probe::resolve_target(&config.probes.internet, INTERNET_DEFAULT_PORT)
        }
        _ => None,
    }
}

/// One-line readout of a snapshot.
pub fn format_summary(s: &StatsSnapshot) -> String {
    let mut line = format!(
        "#{} cpu {:.1}% mem {:.1}% ({:.2}/{:.0} GB) disk {:.1}% ({:.0} GB free) \
         bat {:.0}%{} ({}) thermal {} down {} up {} (total {} / {}) \
         wifi {:.0} dBm {:.0} Mbps noise {:.0} dBm \
         router {:.0} ms/{:.1} ms/{:.0}% dns {:.0} ms internet {:.0} ms/{:.1} ms up {}s",
        s.cycle,
        s.cpu.usage_percent,
        s.memory.usage_percent,
        s.memory.used_gb,
        s.memory.total_gb,
        s.disk.usage_percent,
        s.disk.free_gb,
        s.battery.level_percent,
        if s.battery.charging { "+" } else { "" },
        format_minutes(s.battery.minutes_remaining),
        s.thermal.pressure.label(),
        format_rate(s.network.download_bps),
        format_rate(s.network.upload_bps),
        format_bytes(s.network.total_downloaded as f64),
        format_bytes(s.network.total_uploaded as f64),
        s.wireless.rssi_dbm,
        s.wireless.link_rate_mbps,
        s.wireless.noise_dbm,
        s.router.rtt_ms,
        s.router.jitter_ms,
        s.router.loss_percent,
        s.dns.rtt_ms,
        s.internet.rtt_ms,
        s.internet.jitter_ms,
        s.uptime_secs,
    );
    if let Some(dns) = s.targets.dns {
        line.push_str(&format!(" dns server {}", dns.ip()));
    }
    if !s.stale.is_empty() {
        let names: Vec<&str> = s.stale.iter().map(|k| k.name()).collect();
        line.push_str(" stale: ");
        line.push_str(&names.join(","));
    }
    line
}
