//! Wi-Fi link rate, signal and noise.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{read_trimmed, Derivation, RawReader};
use crate::constants::NOISE_UNAVAILABLE_DBM;
use crate::error::SourceError;
use crate::models::{MetricId, SourceKind, StatsSnapshot, WirelessStats};

/// Radio readings; 0 in any field means the platform did not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WirelessReading {
    pub link_rate_mbps: f64,
    pub rssi_dbm: f64,
    pub noise_dbm: f64,
}

#[derive(Debug, Default)]
pub struct WirelessRule;

impl Derivation for WirelessRule {
    type Raw = WirelessReading;
    type Value = WirelessStats;

    fn kind(&self) -> SourceKind {
        SourceKind::Wireless
    }

    fn baseline(&self) -> WirelessStats {
        WirelessStats::default()
    }

    /// Passed through as reported; the sampler clamps history samples.
    fn derive(
        &mut self,
        raw: WirelessReading,
        _elapsed: Option<Duration>,
    ) -> Option<WirelessStats> {
        Some(WirelessStats {
            link_rate_mbps: raw.link_rate_mbps,
            rssi_dbm: raw.rssi_dbm,
            noise_dbm: raw.noise_dbm,
        })
    }

    fn publish(&self, value: &WirelessStats, snapshot: &mut StatsSnapshot) {
        snapshot.wireless = value.clone();
    }

    fn history_points(&self, value: &WirelessStats) -> Vec<(MetricId, f64)> {
        vec![
            (MetricId::LinkRate, value.link_rate_mbps),
            (MetricId::Rssi, value.rssi_dbm),
            (MetricId::Noise, value.noise_dbm),
        ]
    }
}

/// Latest bitrate from a background `iw` query task for one interface.
struct LinkRateTask {
    interface: String,
    rate: Arc<Mutex<f64>>,
    task: JoinHandle<()>,
}

impl Drop for LinkRateTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(rate: &Mutex<f64>) -> MutexGuard<'_, f64> {
    rate.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reads `/proc/net/wireless` each cycle. The bitrate comes from `iw`,
/// queried by a background task so a stalled query never holds up a cycle.
pub struct ProcWirelessReader {
    path: PathBuf,
    program: String,
    interface: Option<String>,
    refresh: Duration,
    timeout: Duration,
    link: Option<LinkRateTask>,
}

impl ProcWirelessReader {
    /// Watch one interface, or the first listed one when `None`. The bitrate
    /// is refreshed every `refresh`, each query bounded by `timeout`.
    pub fn new(interface: Option<String>, refresh: Duration, timeout: Duration) -> Self {
        Self {
            path: PathBuf::from("/proc/net/wireless"),
            program: "iw".to_string(),
            interface,
            refresh,
            timeout,
            link: None,
        }
    }

    /// Last known bitrate, starting the query task for `interface` if needed.
    /// Outside a tokio runtime the bitrate stays unreported.
    fn link_rate(&mut self, interface: &str) -> f64 {
        if self.link.as_ref().is_some_and(|l| l.interface == interface) {
            return self.link.as_ref().map_or(0.0, |l| *lock(&l.rate));
        }

        self.link = None;
        let Ok(runtime) = Handle::try_current() else {
            return 0.0;
        };
        let rate = Arc::new(Mutex::new(0.0));
        let task = runtime.spawn(poll_link_rate(
            self.program.clone(),
            interface.to_string(),
            self.refresh,
            self.timeout,
            Arc::clone(&rate),
        ));
        self.link = Some(LinkRateTask {
            interface: interface.to_string(),
            rate,
            task,
        });
        0.0
    }
}

impl RawReader<WirelessReading> for ProcWirelessReader {
    fn read(&mut self) -> Result<WirelessReading, SourceError> {
        let content = read_trimmed(&self.path)?;
        let (interface, rssi_dbm, noise_dbm) =
            parse_proc_wireless(&content, self.interface.as_deref())
                .ok_or(SourceError::Unavailable("wireless interface"))?;
        let link_rate_mbps = self.link_rate(&interface);
        Ok(WirelessReading {
            link_rate_mbps,
            rssi_dbm,
            noise_dbm,
        })
    }
}

async fn poll_link_rate(
    program: String,
    interface: String,
    refresh: Duration,
    timeout: Duration,
    rate: Arc<Mutex<f64>>,
) {
    let mut ticker = tokio::time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match query_link_rate(&program, &interface, timeout).await {
            Ok(mbps) => *lock(&rate) = mbps,
            Err(SourceError::Unavailable(_)) => {
                debug!(program = %program, "iw not available, link rate disabled");
                return;
            }
            // Keep the last bitrate
            Err(e) => debug!(interface = %interface, error = %e, "link rate query failed"),
        }
    }
}

/// Run `<program> dev <interface> link` once, killing it after `timeout`.
/// A link without a reported bitrate (not connected) reads as 0.
pub async fn query_link_rate(
    program: &str,
    interface: &str,
    timeout: Duration,
) -> Result<f64, SourceError> {
    let command = || format!("{program} dev {interface} link");
    let child = Command::new(program)
        .args(["dev", interface, "link"])
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
            return Err(SourceError::Unavailable("iw"));
        }
        Ok(Err(e)) => {
            return Err(SourceError::Command {
                command: command(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            return Err(SourceError::Command {
                command: command(),
                reason: format!("timed out after {} ms", timeout.as_millis()),
            });
        }
    };

    if !output.status.success() {
        return Err(SourceError::Command {
            command: command(),
            reason: output.status.to_string(),
        });
    }
    Ok(parse_iw_bitrate(&String::from_utf8_lossy(&output.stdout)).unwrap_or(0.0))
}

/// Parse `/proc/net/wireless` into (interface, level dBm, noise dBm).
///
/// Drivers that report unsigned levels use the 8-bit wrapped form, so
/// positive values are shifted down by 256. A noise of -256 means the
/// driver does not know and reads as 0.
pub fn parse_proc_wireless(
    content: &str,
    interface: Option<&str>,
) -> Option<(String, f64, f64)> {
    content.lines().skip(2).find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        let name = name.trim();
        if interface.is_some_and(|wanted| wanted != name) {
            return None;
        }
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // status, link, level, noise, ...
        let number =
            |i: usize| -> Option<f64> { fields.get(i)?.trim_end_matches('.').parse().ok() };

        let mut level = number(2)?;
        let mut noise = number(3)?;
        if level > 0.0 {
            level -= 256.0;
        }
        if noise == NOISE_UNAVAILABLE_DBM {
            noise = 0.0;
        } else if noise > 0.0 {
            noise -= 256.0;
        }
        Some((name.to_string(), level, noise))
    })
}

/// Extract `tx bitrate: 866.7 MBit/s` from `iw dev <if> link`.
pub fn parse_iw_bitrate(output: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("tx bitrate:")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}
