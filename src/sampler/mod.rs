//! One sampling cycle: read every source, advance history, publish.

mod scheduler;

pub use scheduler::Scheduler;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::history::HistoryBuffer;
use crate::models::{MetricId, SourceKind, StatsSnapshot};
use crate::publisher::SnapshotPublisher;
use crate::sources::{MetricSource, SampleStatus};

/// Owns the sources, their history windows and the cycle counter.
///
/// Only the scheduler's driver (or an explicit `run_cycle` caller) touches
/// a sampler; readers go through the [`SnapshotPublisher`].
pub struct Sampler {
    sources: Vec<Box<dyn MetricSource>>,
    history: BTreeMap<MetricId, HistoryBuffer>,
    depth: usize,
    cycle: u64,
    last_cycle: Option<Instant>,
    started_at: DateTime<Utc>,
    publisher: Arc<SnapshotPublisher>,
}

impl Sampler {
    pub fn new(depth: usize, publisher: Arc<SnapshotPublisher>) -> Self {
        let depth = depth.max(1);
        let history = MetricId::ALL
            .into_iter()
            .map(|id| (id, HistoryBuffer::new(depth)))
            .collect();
        Self {
            sources: Vec::new(),
            history,
            depth,
            cycle: 0,
            last_cycle: None,
            started_at: Utc::now(),
            publisher,
        }
    }

    /// Add a source. Sources are sampled in registration order; a second
    /// source of the same kind replaces the first.
    pub fn register(&mut self, source: Box<dyn MetricSource>) {
        let kind = source.kind();
        if let Some(slot) = self.sources.iter_mut().find(|s| s.kind() == kind) {
            warn!(source = kind.name(), "source registered twice, replacing");
            *slot = source;
        } else {
            self.sources.push(source);
        }
    }

    pub fn registered(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Run one cycle at time `now` and publish its snapshot.
    ///
    /// Never fails: sources that cannot be read keep their previous value,
    /// are flagged stale, and still advance their history.
    pub fn run_cycle(&mut self, now: Instant) -> Arc<StatsSnapshot> {
        let elapsed = self.last_cycle.map(|t| now.saturating_duration_since(t));
        self.last_cycle = Some(now);
        self.cycle += 1;

        let mut stale = Vec::new();
        for source in &mut self.sources {
            let kind = source.kind();
            match source.sample(elapsed) {
                SampleStatus::Fresh => {}
                SampleStatus::Held => {
                    trace!(source = kind.name(), "no new value this cycle");
                    stale.push(kind);
                }
                SampleStatus::Failed(e) => {
                    debug!(source = kind.name(), error = %e, "read failed, keeping previous value");
                    stale.push(kind);
                }
            }

            for (id, value) in source.history_points() {
                if let Some(buffer) = self.history.get_mut(&id) {
                    buffer.push(id.definition().clamp(value));
                }
            }
        }

        let windows = self
            .history
            .iter()
            .map(|(id, buffer)| (*id, buffer.freeze()))
            .collect();
        let mut snapshot = StatsSnapshot::with_history(self.cycle, windows);
        snapshot.set_started_at(self.started_at);
        for source in &self.sources {
            source.publish(&mut snapshot);
        }
        snapshot.stale.extend(stale);

        self.publisher.publish(snapshot)
    }

    /// Current contents of one history window.
    pub fn history(&self, id: MetricId) -> Vec<f64> {
        self.history
            .get(&id)
            .map(HistoryBuffer::values)
            .unwrap_or_default()
    }

    /// Completed cycles.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sources::cpu::{CpuReading, CpuRule, CpuTicks};
    use crate::sources::network::{NetworkCounters, NetworkRule};
    use crate::sources::wireless::{WirelessReading, WirelessRule};
    use crate::sources::Source;
    use crate::tips::{self, TipKind};
    use std::time::Duration;

    fn cpu(user: u64, system: u64, idle: u64, nice: u64) -> Result<CpuReading, SourceError> {
        Ok(CpuReading {
            ticks: CpuTicks {
                user,
                system,
                idle,
                nice,
            },
            physical_cores: 2,
            logical_cores: 4,
        })
    }

    fn sampler(depth: usize) -> Sampler {
        Sampler::new(depth, Arc::new(SnapshotPublisher::new(depth)))
    }

    fn scripted<R: Send + 'static>(
        feed: Vec<Result<R, SourceError>>,
    ) -> impl FnMut() -> Result<R, SourceError> + Send {
        let mut feed = feed.into_iter();
        move || {
            feed.next().unwrap_or(Err(SourceError::Unavailable("scripted feed")))
        }
    }

    #[test]
    fn cpu_scenario_retains_on_stall() {
        let mut s = sampler(3);
        s.register(
            Source::new(
                CpuRule::default(),
                scripted(vec![cpu(0, 0, 0, 0), cpu(10, 5, 85, 0), cpu(10, 5, 85, 0)]),
            )
            .boxed(),
        );

        let t0 = Instant::now();
        let first = s.run_cycle(t0);
        assert_eq!(first.cpu.usage_percent, 0.0);
        assert!(first.is_stale(SourceKind::Cpu));

        let second = s.run_cycle(t0 + Duration::from_secs(1));
        assert_eq!(second.cpu.usage_percent, 15.0);
        assert!(!second.is_stale(SourceKind::Cpu));

        let third = s.run_cycle(t0 + Duration::from_secs(2));
        assert_eq!(third.cpu.usage_percent, 15.0);
        assert_eq!(third.cycle, 3);
        assert_eq!(s.history(MetricId::CpuUsage), vec![0.0, 15.0, 15.0]);
        assert_eq!(third.history(MetricId::CpuUsage).expect("window").len(), 3);
    }

    #[test]
    fn every_window_stays_full() {
        let depth = 4;
        let mut s = sampler(depth);
        s.register(Source::new(CpuRule::default(), || cpu(1, 1, 1, 1)).boxed());
        s.register(
            Source::new(NetworkRule::default(), || {
                Err(SourceError::Unavailable("network interface"))
            })
            .boxed(),
        );

        let t0 = Instant::now();
        for i in 0..10 {
            let snap = s.run_cycle(t0 + Duration::from_secs(i));
            for id in MetricId::ALL {
                assert_eq!(snap.history(id).expect("window").len(), depth);
                assert_eq!(s.history(id).len(), depth);
            }
        }
    }

    #[test]
    fn failed_source_is_stale_and_advances() {
        let mut s = sampler(3);
        s.register(
            Source::new(
                NetworkRule::default(),
                scripted(vec![
                    Ok(NetworkCounters {
                        rx_bytes: 0,
                        tx_bytes: 0,
                    }),
                    Ok(NetworkCounters {
                        rx_bytes: 2000,
                        tx_bytes: 1000,
                    }),
                ]),
            )
            .boxed(),
        );

        let t0 = Instant::now();
        s.run_cycle(t0);
        let fresh = s.run_cycle(t0 + Duration::from_secs(2));
        assert_eq!(fresh.network.download_bps, 1000.0);
        assert!(!fresh.is_stale(SourceKind::Network));

        let failed = s.run_cycle(t0 + Duration::from_secs(3));
        assert!(failed.is_stale(SourceKind::Network));
        assert_eq!(failed.network.download_bps, 1000.0);
        assert_eq!(s.history(MetricId::NetDownload), vec![0.0, 1000.0, 1000.0]);
        assert_eq!(s.history(MetricId::NetUpload), vec![0.0, 500.0, 500.0]);
        assert_eq!(s.history(MetricId::NetTotal), vec![0.0, 1500.0, 1500.0]);
    }

    #[test]
    fn wireless_history_is_clamped_but_snapshot_is_not() {
        let mut s = sampler(2);
        s.register(
            Source::new(WirelessRule, || {
                Ok(WirelessReading {
                    link_rate_mbps: 866.0,
                    rssi_dbm: -130.0,
                    noise_dbm: 0.0,
                })
            })
            .boxed(),
        );
        let snap = s.run_cycle(Instant::now());
        assert_eq!(snap.wireless.link_rate_mbps, 866.0);
        assert_eq!(snap.history(MetricId::LinkRate).expect("window")[1], 150.0);
        assert_eq!(snap.history(MetricId::Rssi).expect("window")[1], -120.0);
        // Unset noise stays at the sentinel
        assert_eq!(snap.history(MetricId::Noise).expect("window")[1], 0.0);
    }

    #[test]
    fn unregistered_sources_keep_baseline() {
        let mut s = sampler(3);
        s.register(Source::new(CpuRule::default(), || cpu(1, 1, 1, 1)).boxed());
        let snap = s.run_cycle(Instant::now());
        assert_eq!(snap.battery.minutes_remaining, -1);
        assert!(snap
            .history(MetricId::BatteryLevel)
            .expect("window")
            .iter()
            .all(|v| *v == 0.0));
        assert!(!snap.is_stale(SourceKind::Battery));
    }

    #[test]
    fn publishes_through_publisher() {
        let mut s = sampler(3);
        let publisher = Arc::clone(s.publisher());
        assert_eq!(publisher.current().cycle, 0);
        s.run_cycle(Instant::now());
        assert_eq!(publisher.current().cycle, 1);
        assert_eq!(s.cycle(), 1);
    }

    #[test]
    fn duplicate_kind_replaces() {
        let mut s = sampler(3);
        s.register(Source::new(CpuRule::default(), || cpu(0, 0, 0, 0)).boxed());
        s.register(Source::new(CpuRule::default(), || cpu(0, 0, 0, 0)).boxed());
        assert_eq!(s.registered(), vec![SourceKind::Cpu]);
    }

    fn rssi(rssi_dbm: f64) -> Result<WirelessReading, SourceError> {
        Ok(WirelessReading {
            link_rate_mbps: 300.0,
            rssi_dbm,
            noise_dbm: -95.0,
        })
    }

    #[test]
    fn weak_signal_tip_follows_rssi_feed() {
        let mut s = sampler(3);
        s.register(
            Source::new(
                WirelessRule,
                scripted(vec![rssi(-70.0), rssi(-80.0), rssi(-76.0)]),
            )
            .boxed(),
        );

        let t0 = Instant::now();
        let flagged: Vec<bool> = (0..3)
            .map(|i| {
                let snap = s.run_cycle(t0 + Duration::from_secs(i));
                tips::evaluate(&snap)
                    .iter()
                    .any(|tip| tip.kind == TipKind::WeakSignal)
            })
            .collect();
        assert_eq!(flagged, vec![false, true, true]);
        assert_eq!(s.history(MetricId::Rssi), vec![-70.0, -80.0, -76.0]);
    }

    #[test]
    fn snapshots_carry_uptime_since_creation() {
        let mut s = sampler(2);
        let started = s.started_at();
        let snap = s.run_cycle(Instant::now());
        assert_eq!(snap.started_at, started);
        assert!(snap.taken_at >= started);
    }
}
