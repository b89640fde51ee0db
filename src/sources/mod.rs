//! Metric sources: raw reading in, derived value out.
//!
//! Each variant is split in two halves:
//!
//! - a [`RawReader`] that talks to the OS or an external prober and returns
//!   one raw reading per call;
//! - a [`Derivation`] that owns the variant's counter state and turns the
//!   raw reading into a derived value (percentage, rate, level).
//!
//! [`Source`] glues the two together and remembers the last derived value,
//! so a failed read or an undefined delta republishes the previous one.

pub mod battery;
pub mod cpu;
pub mod disk;
pub mod latency;
pub mod memory;
pub mod network;
pub mod thermal;
pub mod wireless;

use std::time::Duration;

use crate::error::SourceError;
use crate::models::{MetricId, SourceKind, StatsSnapshot};

/// Synchronous "read current value(s)" call against one upstream.
///
/// Any `FnMut() -> Result<R, SourceError>` closure is a reader, which is how
/// tests and embedders inject synthetic readings.
pub trait RawReader<R>: Send {
    fn read(&mut self) -> Result<R, SourceError>;
}

impl<R, F> RawReader<R> for F
where
    F: FnMut() -> Result<R, SourceError> + Send,
{
    fn read(&mut self) -> Result<R, SourceError> {
        self()
    }
}

/// Derivation rule of one source variant together with its counter state.
pub trait Derivation: Send {
    type Raw;
    type Value: Clone + Send;

    fn kind(&self) -> SourceKind;

    /// Value published before the first successful derivation.
    fn baseline(&self) -> Self::Value;

    /// Derive a value from a fresh reading, updating the counter state.
    /// `elapsed` is the time since the previous cycle (None on the first).
    /// Returning `None` suppresses emission and keeps the previous value.
    fn derive(&mut self, raw: Self::Raw, elapsed: Option<Duration>) -> Option<Self::Value>;

    /// Copy the value into its snapshot section.
    fn publish(&self, value: &Self::Value, snapshot: &mut StatsSnapshot);

    /// Samples to append to history, one per metric of this source.
    fn history_points(&self, value: &Self::Value) -> Vec<(MetricId, f64)>;
}

/// Result of sampling one source in one cycle.
#[derive(Debug)]
pub enum SampleStatus {
    /// A new value was derived.
    Fresh,
    /// Reading succeeded but no value could be derived (first delta,
    /// stalled counters); the previous value stands.
    Held,
    /// Reading failed; the previous value stands.
    Failed(SourceError),
}

impl SampleStatus {
    pub fn is_fresh(&self) -> bool {
        matches!(self, SampleStatus::Fresh)
    }
}

/// Object-safe view of a source, as driven by the sampler.
pub trait MetricSource: Send {
    fn kind(&self) -> SourceKind;
    fn sample(&mut self, elapsed: Option<Duration>) -> SampleStatus;
    fn publish(&self, snapshot: &mut StatsSnapshot);
    fn history_points(&self) -> Vec<(MetricId, f64)>;
}

/// A derivation rule wired to its reader.
pub struct Source<D: Derivation> {
    rule: D,
    reader: Box<dyn RawReader<D::Raw>>,
    value: D::Value,
}

impl<D> Source<D>
where
    D: Derivation + 'static,
    D::Raw: 'static,
{
    pub fn new(rule: D, reader: impl RawReader<D::Raw> + 'static) -> Self {
        let value = rule.baseline();
        Self {
            rule,
            reader: Box::new(reader),
            value,
        }
    }

    pub fn boxed(self) -> Box<dyn MetricSource> {
        Box::new(self)
    }

    /// Last derived (or retained) value.
    pub fn value(&self) -> &D::Value {
        &self.value
    }
}

impl<D> MetricSource for Source<D>
where
    D: Derivation + 'static,
    D::Raw: 'static,
{
    fn kind(&self) -> SourceKind {
        self.rule.kind()
    }

    fn sample(&mut self, elapsed: Option<Duration>) -> SampleStatus {
        let raw = match self.reader.read() {
            Ok(raw) => raw,
            Err(e) => return SampleStatus::Failed(e),
        };
        match self.rule.derive(raw, elapsed) {
            Some(value) => {
                self.value = value;
                SampleStatus::Fresh
            }
            None => SampleStatus::Held,
        }
    }

    fn publish(&self, snapshot: &mut StatsSnapshot) {
        self.rule.publish(&self.value, snapshot);
    }

    fn history_points(&self) -> Vec<(MetricId, f64)> {
        self.rule.history_points(&self.value)
    }
}

/// Read a sysfs/procfs file into a trimmed string.
pub(crate) fn read_trimmed(path: &std::path::Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| SourceError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::cpu::{CpuReading, CpuRule, CpuTicks};
    use super::*;

    fn reading(user: u64, system: u64, idle: u64, nice: u64) -> CpuReading {
        CpuReading {
            ticks: CpuTicks {
                user,
                system,
                idle,
                nice,
            },
            physical_cores: 4,
            logical_cores: 8,
        }
    }

    #[test]
    fn failed_read_keeps_previous_value() {
        let mut feed = vec![
            Ok(reading(0, 0, 0, 0)),
            Ok(reading(50, 0, 50, 0)),
            Err(SourceError::Unavailable("cpu counters")),
        ]
        .into_iter();
        let mut source = Source::new(CpuRule::default(), move || {
            feed.next().unwrap_or(Err(SourceError::Unavailable("cpu counters")))
        });

        assert!(matches!(source.sample(None), SampleStatus::Held));
        assert!(source.sample(Some(Duration::from_secs(1))).is_fresh());
        assert_eq!(source.value().usage_percent, 50.0);

        let status = source.sample(Some(Duration::from_secs(1)));
        assert!(matches!(status, SampleStatus::Failed(_)));
        assert_eq!(source.value().usage_percent, 50.0);
        assert_eq!(source.history_points(), vec![(MetricId::CpuUsage, 50.0)]);
    }

    #[test]
    fn publish_writes_section() {
        let mut source = Source::new(CpuRule::default(), || Ok(reading(0, 0, 0, 0)));
        source.sample(None);
        let mut snap = StatsSnapshot::baseline(3);
        source.publish(&mut snap);
        assert_eq!(snap.cpu.logical_cores, 0);
        assert_eq!(source.kind(), SourceKind::Cpu);
    }
}
