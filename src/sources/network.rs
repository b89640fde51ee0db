//! Network throughput from cumulative byte counters.

use std::time::Duration;

use sysinfo::Networks;

use super::{Derivation, RawReader};
use crate::error::SourceError;
use crate::models::{MetricId, NetworkStats, SourceKind, StatsSnapshot};

/// Cumulative bytes across the watched interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Default)]
pub struct NetworkRule {
    previous: Option<NetworkCounters>,
    total_rx: u64,
    total_tx: u64,
}

impl Derivation for NetworkRule {
    type Raw = NetworkCounters;
    type Value = NetworkStats;

    fn kind(&self) -> SourceKind {
        SourceKind::Network
    }

    fn baseline(&self) -> NetworkStats {
        NetworkStats::default()
    }

    fn derive(&mut self, raw: NetworkCounters, elapsed: Option<Duration>) -> Option<NetworkStats> {
        let prev = self.previous.replace(raw)?;

        // A reset (interface bounce, wrap) shows up as a negative delta
        let rx = raw.rx_bytes.saturating_sub(prev.rx_bytes);
        let tx = raw.tx_bytes.saturating_sub(prev.tx_bytes);
        self.total_rx = self.total_rx.saturating_add(rx);
        self.total_tx = self.total_tx.saturating_add(tx);

        let secs = elapsed
            .map(|d| d.as_secs_f64())
            .filter(|s| *s > 0.0)
            .unwrap_or(1.0);

        Some(NetworkStats {
            download_bps: rx as f64 / secs,
            upload_bps: tx as f64 / secs,
            total_downloaded: self.total_rx,
            total_uploaded: self.total_tx,
        })
    }

    fn publish(&self, value: &NetworkStats, snapshot: &mut StatsSnapshot) {
        snapshot.network = value.clone();
    }

    fn history_points(&self, value: &NetworkStats) -> Vec<(MetricId, f64)> {
        vec![
            (MetricId::NetDownload, value.download_bps),
            (MetricId::NetUpload, value.upload_bps),
            (MetricId::NetTotal, value.download_bps + value.upload_bps),
        ]
    }
}

/// Sums sysinfo interface counters, skipping loopback.
pub struct InterfaceCounterReader {
    networks: Networks,
    interface: Option<String>,
}

impl InterfaceCounterReader {
    /// Watch one interface, or every non-loopback interface when `None`.
    pub fn new(interface: Option<String>) -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            interface,
        }
    }

    fn counts(&self, name: &str) -> bool {
        match &self.interface {
            Some(wanted) => name == wanted,
            None => name != "lo",
        }
    }
}

impl RawReader<NetworkCounters> for InterfaceCounterReader {
    fn read(&mut self) -> Result<NetworkCounters, SourceError> {
        self.networks.refresh();

        let mut seen = false;
        let mut counters = NetworkCounters::default();
        for (name, data) in self.networks.iter() {
            if !self.counts(name) {
                continue;
            }
            seen = true;
            counters.rx_bytes = counters.rx_bytes.saturating_add(data.total_received());
            counters.tx_bytes = counters.tx_bytes.saturating_add(data.total_transmitted());
        }

        if seen {
            Ok(counters)
        } else {
            Err(SourceError::Unavailable("network interface"))
        }
    }
}
