//! Round-trip time, jitter and loss towards one probe target.

use std::net::SocketAddr;
use std::time::Duration;

use super::Derivation;
use crate::models::{LatencyStats, MetricId, SourceKind, StatsSnapshot};

/// Latest outcome published by a prober.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    /// Increments with every attempt; repeated reads of the same attempt
    /// carry the same sequence number.
    pub seq: u64,
    /// Round trip of the latest attempt, `None` when it was lost.
    pub rtt_ms: Option<f64>,
    /// Lost attempts over the prober window, percent.
    pub loss_percent: f64,
}

/// Jitter is the absolute change from the previous round trip.
#[derive(Debug)]
pub struct LatencyRule {
    kind: SourceKind,
    target: Option<SocketAddr>,
    previous_rtt: Option<f64>,
    last_seq: Option<u64>,
    last: LatencyStats,
}

impl LatencyRule {
    /// `kind` must be one of Router, Dns or Internet.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            target: None,
            previous_rtt: None,
            last_seq: None,
            last: LatencyStats::default(),
        }
    }

    /// Address being probed, published alongside the stats.
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = Some(target);
        self
    }
}

impl Derivation for LatencyRule {
    type Raw = ProbeResult;
    type Value = LatencyStats;

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn baseline(&self) -> LatencyStats {
        LatencyStats::default()
    }

    fn derive(&mut self, raw: ProbeResult, _elapsed: Option<Duration>) -> Option<LatencyStats> {
        if self.last_seq == Some(raw.seq) {
            return Some(self.last.clone());
        }
        self.last_seq = Some(raw.seq);

        let loss_percent = raw.loss_percent.clamp(0.0, 100.0);
        let stats = match raw.rtt_ms {
            Some(rtt) => {
                let jitter = self
                    .previous_rtt
                    .map(|prev| (rtt - prev).abs())
                    .unwrap_or(0.0);
                self.previous_rtt = Some(rtt);
                LatencyStats {
                    rtt_ms: rtt,
                    jitter_ms: jitter,
                    loss_percent,
                }
            }
            // Lost attempt: keep the last round trip, update loss only
            None => LatencyStats {
                loss_percent,
                ..self.last.clone()
            },
        };
        self.last = stats.clone();
        Some(stats)
    }

    fn publish(&self, value: &LatencyStats, snapshot: &mut StatsSnapshot) {
        let (section, target) = match self.kind {
            SourceKind::Router => (&mut snapshot.router, &mut snapshot.targets.router),
            SourceKind::Dns => (&mut snapshot.dns, &mut snapshot.targets.dns),
            SourceKind::Internet => (&mut snapshot.internet, &mut snapshot.targets.internet),
            _ => return,
        };
        *section = value.clone();
        *target = self.target;
    }

    fn history_points(&self, value: &LatencyStats) -> Vec<(MetricId, f64)> {
        match self.kind {
            SourceKind::Router => vec![
                (MetricId::RouterPing, value.rtt_ms),
                (MetricId::RouterJitter, value.jitter_ms),
                (MetricId::RouterLoss, value.loss_percent),
            ],
            SourceKind::Dns => vec![
                (MetricId::DnsPing, value.rtt_ms),
                (MetricId::DnsJitter, value.jitter_ms),
            ],
            SourceKind::Internet => vec![
                (MetricId::InternetPing, value.rtt_ms),
                (MetricId::InternetJitter, value.jitter_ms),
            ],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(seq: u64, rtt: Option<f64>, loss: f64) -> ProbeResult {
        ProbeResult {
            seq,
            rtt_ms: rtt,
            loss_percent: loss,
        }
    }

    #[test]
    fn first_rtt_has_zero_jitter() {
        let mut rule = LatencyRule::new(SourceKind::Router);
        let stats = rule.derive(result(1, Some(12.0), 0.0), None).expect("stats");
        assert_eq!(stats.rtt_ms, 12.0);
        assert_eq!(stats.jitter_ms, 0.0);
    }

    #[test]
    fn jitter_is_change_from_previous() {
        let mut rule = LatencyRule::new(SourceKind::Dns);
        rule.derive(result(1, Some(20.0), 0.0), None);
        let stats = rule.derive(result(2, Some(14.5), 0.0), None).expect("stats");
        assert_eq!(stats.jitter_ms, 5.5);
        let stats = rule.derive(result(3, Some(30.0), 0.0), None).expect("stats");
        assert_eq!(stats.jitter_ms, 15.5);
    }

    #[test]
    fn lost_attempt_updates_loss_only() {
        let mut rule = LatencyRule::new(SourceKind::Router);
        rule.derive(result(1, Some(10.0), 0.0), None);
        rule.derive(result(2, Some(16.0), 0.0), None);
        let stats = rule.derive(result(3, None, 5.0), None).expect("stats");
        assert_eq!(stats.rtt_ms, 16.0);
        assert_eq!(stats.jitter_ms, 6.0);
        assert_eq!(stats.loss_percent, 5.0);

        // Jitter after the loss is measured against the last received RTT
        let stats = rule.derive(result(4, Some(15.0), 5.0), None).expect("stats");
        assert_eq!(stats.jitter_ms, 1.0);
    }

    #[test]
    fn repeated_attempt_is_not_rederived() {
        let mut rule = LatencyRule::new(SourceKind::Internet);
        rule.derive(result(1, Some(10.0), 0.0), None);
        rule.derive(result(2, Some(40.0), 0.0), None);
        let stats = rule.derive(result(2, Some(40.0), 0.0), None).expect("stats");
        assert_eq!(stats.jitter_ms, 30.0);
    }

    #[test]
    fn publishes_into_own_section() {
        let mut rule = LatencyRule::new(SourceKind::Dns);
        let stats = rule.derive(result(1, Some(8.0), 10.0), None).expect("stats");
        let mut snap = StatsSnapshot::baseline(4);
        rule.publish(&stats, &mut snap);
        assert_eq!(snap.dns.rtt_ms, 8.0);
        assert_eq!(snap.router.rtt_ms, 0.0);
        assert!(snap.targets.dns.is_none());
        assert_eq!(rule.history_points(&stats).len(), 2);
        assert_eq!(
            LatencyRule::new(SourceKind::Router).history_points(&stats)[2],
            (MetricId::RouterLoss, 10.0)
        );
    }

    #[test]
    fn publishes_probed_address() {
        let target: SocketAddr = "192.168.1.1:53".parse().expect("addr");
        let rule = LatencyRule::new(SourceKind::Dns).with_target(target);
        let mut snap = StatsSnapshot::baseline(2);
        rule.publish(&LatencyStats::default(), &mut snap);
        assert_eq!(snap.targets.dns, Some(target));
        assert!(snap.targets.router.is_none());
    }
}
