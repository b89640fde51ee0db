//! Thermal pressure level.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{read_trimmed, Derivation, RawReader};
use crate::constants::{MAX_THERMAL_ZONES, THERMAL_CRITICAL_C, THERMAL_FAIR_C, THERMAL_SERIOUS_C};
use crate::error::SourceError;
use crate::models::{MetricId, SourceKind, StatsSnapshot, ThermalPressure, ThermalStats};

#[derive(Debug, Default)]
pub struct ThermalRule;

impl Derivation for ThermalRule {
    type Raw = ThermalPressure;
    type Value = ThermalStats;

    fn kind(&self) -> SourceKind {
        SourceKind::Thermal
    }

    fn baseline(&self) -> ThermalStats {
        ThermalStats::default()
    }

    fn derive(&mut self, raw: ThermalPressure, _elapsed: Option<Duration>) -> Option<ThermalStats> {
        // Unknown states read as Normal
        let pressure = match raw {
            ThermalPressure::Unknown => ThermalPressure::Normal,
            other => other,
        };
        Some(ThermalStats {
            pressure,
            level: pressure.level(),
        })
    }

    fn publish(&self, value: &ThermalStats, snapshot: &mut StatsSnapshot) {
        snapshot.thermal = value.clone();
    }

    fn history_points(&self, value: &ThermalStats) -> Vec<(MetricId, f64)> {
        vec![(MetricId::ThermalPressure, value.level)]
    }
}

/// Map a temperature in Celsius onto a pressure level.
pub fn pressure_for_celsius(celsius: f64) -> ThermalPressure {
    if celsius.is_nan() {
        ThermalPressure::Unknown
    } else if celsius >= THERMAL_CRITICAL_C {
        ThermalPressure::Critical
    } else if celsius >= THERMAL_SERIOUS_C {
        ThermalPressure::Serious
    } else if celsius >= THERMAL_FAIR_C {
        ThermalPressure::Fair
    } else {
        ThermalPressure::Normal
    }
}

/// Hottest `/sys/class/thermal/thermal_zone*` mapped to a pressure level.
pub struct ThermalZoneReader {
    root: PathBuf,
}

impl ThermalZoneReader {
    pub fn new() -> Self {
        Self::with_root("/sys/class/thermal")
    }

    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn hottest_celsius(&self) -> Option<f64> {
        (0..MAX_THERMAL_ZONES)
            .filter_map(|i| {
                let path = self.root.join(format!("thermal_zone{i}")).join("temp");
                let millideg: f64 = read_trimmed(&path).ok()?.parse().ok()?;
                Some(millideg / 1000.0)
            })
            .reduce(f64::max)
    }
}

impl Default for ThermalZoneReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RawReader<ThermalPressure> for ThermalZoneReader {
    fn read(&mut self) -> Result<ThermalPressure, SourceError> {
        self.hottest_celsius()
            .map(pressure_for_celsius)
            .ok_or(SourceError::Unavailable("thermal zones"))
    }
}
