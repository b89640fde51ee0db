//! Battery level and time remaining.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{read_trimmed, Derivation, RawReader};
use crate::error::SourceError;
use crate::models::{BatteryStats, MetricId, SourceKind, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSourceKind {
    InternalBattery,
    /// Batteries of attached devices (mice, headsets, UPS units).
    External,
    Mains,
    Other,
}

/// One entry of the platform's power source list.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSource {
    pub kind: PowerSourceKind,
    pub current_capacity: f64,
    pub max_capacity: f64,
    pub charging: bool,
    pub minutes_to_empty: Option<i64>,
}

#[derive(Debug, Default)]
pub struct BatteryRule;

impl Derivation for BatteryRule {
    type Raw = Vec<PowerSource>;
    type Value = BatteryStats;

    fn kind(&self) -> SourceKind {
        SourceKind::Battery
    }

    fn baseline(&self) -> BatteryStats {
        BatteryStats::default()
    }

    fn derive(
        &mut self,
        raw: Vec<PowerSource>,
        _elapsed: Option<Duration>,
    ) -> Option<BatteryStats> {
        let battery = raw
            .into_iter()
            .find(|s| s.kind == PowerSourceKind::InternalBattery)?;
        if battery.max_capacity <= 0.0 {
            return None;
        }

        let level = (battery.current_capacity / battery.max_capacity * 100.0).clamp(0.0, 100.0);
        let minutes_remaining = match battery.minutes_to_empty {
            Some(m) if !battery.charging && m >= 0 => m,
            _ => -1,
        };
        Some(BatteryStats {
            level_percent: level,
            charging: battery.charging,
            minutes_remaining,
        })
    }

    fn publish(&self, value: &BatteryStats, snapshot: &mut StatsSnapshot) {
        snapshot.battery = value.clone();
    }

    fn history_points(&self, value: &BatteryStats) -> Vec<(MetricId, f64)> {
        vec![(MetricId::BatteryLevel, value.level_percent)]
    }
}

/// Walks `/sys/class/power_supply`.
pub struct PowerSupplyReader {
    root: PathBuf,
}

impl PowerSupplyReader {
    pub fn new() -> Self {
        Self::with_root("/sys/class/power_supply")
    }

    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl Default for PowerSupplyReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RawReader<Vec<PowerSource>> for PowerSupplyReader {
    fn read(&mut self) -> Result<Vec<PowerSource>, SourceError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| SourceError::io(&self.root, e))?;

        // read_dir order is arbitrary; sort so BAT0 comes before BAT1
        let mut dirs: Vec<PathBuf> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
        dirs.sort();

        let mut sources: Vec<PowerSource> =
            dirs.iter().filter_map(|dir| read_supply(dir)).collect();
        sources.sort_by_key(|s| s.kind != PowerSourceKind::InternalBattery);
        Ok(sources)
    }
}

fn attr(dir: &Path, name: &str) -> Option<String> {
    read_trimmed(&dir.join(name)).ok()
}

fn attr_f64(dir: &Path, name: &str) -> Option<f64> {
    attr(dir, name)?.parse().ok()
}

/// Read one supply directory; None if it is not a supply we understand.
fn read_supply(dir: &Path) -> Option<PowerSource> {
    let kind = match attr(dir, "type")?.as_str() {
        "Battery" => {
            if attr(dir, "scope").as_deref() == Some("Device") {
                PowerSourceKind::External
            } else {
                PowerSourceKind::InternalBattery
            }
        }
        "Mains" => PowerSourceKind::Mains,
        "UPS" => PowerSourceKind::External,
        _ => PowerSourceKind::Other,
    };

    if kind != PowerSourceKind::InternalBattery {
        return Some(PowerSource {
            kind,
            current_capacity: 0.0,
            max_capacity: 0.0,
            charging: false,
            minutes_to_empty: None,
        });
    }

    let status = attr(dir, "status").unwrap_or_default();
    let charging = status == "Charging";
    let discharging = status == "Discharging";

    let energy = attr_f64(dir, "energy_now").zip(attr_f64(dir, "energy_full"));
    let charge = attr_f64(dir, "charge_now").zip(attr_f64(dir, "charge_full"));

    let (current, max) = match energy.or(charge) {
        Some((now, full)) if full > 0.0 => (now, full),
        _ => (attr_f64(dir, "capacity")?, 100.0),
    };

    let minutes_to_empty = if discharging {
        time_to_empty(dir)
    } else {
        None
    };

    Some(PowerSource {
        kind,
        current_capacity: current,
        max_capacity: max,
        charging,
        minutes_to_empty,
    })
}

/// Minutes to empty from energy/power or charge/current.
fn time_to_empty(dir: &Path) -> Option<i64> {
    if let Some(seconds) = attr_f64(dir, "time_to_empty_now") {
        return Some((seconds / 60.0) as i64);
    }
    let (left, draw) = attr_f64(dir, "energy_now")
        .zip(attr_f64(dir, "power_now"))
        .or_else(|| attr_f64(dir, "charge_now").zip(attr_f64(dir, "current_now")))?;
    if draw <= 0.0 {
        return None;
    }
    Some((left / draw * 60.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn internal(current: f64, max: f64, charging: bool, minutes: Option<i64>) -> PowerSource {
        PowerSource {
            kind: PowerSourceKind::InternalBattery,
            current_capacity: current,
            max_capacity: max,
            charging,
            minutes_to_empty: minutes,
        }
    }

    fn write_supply(root: &Path, name: &str, attrs: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("mkdir");
        for (k, v) in attrs {
            fs::write(dir.join(k), format!("{v}\n")).expect("write attr");
        }
    }

    #[test]
    fn level_from_first_internal_battery() {
        let mut rule = BatteryRule;
        let stats = rule
            .derive(
                vec![
                    PowerSource {
                        kind: PowerSourceKind::External,
                        current_capacity: 1.0,
                        max_capacity: 100.0,
                        charging: false,
                        minutes_to_empty: None,
                    },
                    internal(40.0, 80.0, false, Some(95)),
                ],
                None,
            )
            .expect("derived");
        assert_eq!(stats.level_percent, 50.0);
        assert_eq!(stats.minutes_remaining, 95);
        assert!(!stats.charging);
    }

    #[test]
    fn no_battery_keeps_previous() {
        let mut rule = BatteryRule;
        assert!(rule.derive(Vec::new(), None).is_none());
    }

    #[test]
    fn charging_has_unknown_minutes() {
        let mut rule = BatteryRule;
        let stats = rule
            .derive(vec![internal(90.0, 100.0, true, Some(30))], None)
            .expect("derived");
        assert!(stats.charging);
        assert_eq!(stats.minutes_remaining, -1);
    }

    #[test]
    fn sysfs_energy_battery() {
        let root = TempDir::new().expect("tempdir");
        write_supply(root.path(), "AC", &[("type", "Mains"), ("online", "0")]);
        write_supply(
            root.path(),
            "BAT0",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("energy_now", "30000000"),
                ("energy_full", "60000000"),
                ("power_now", "15000000"),
            ],
        );

        let sources = PowerSupplyReader::with_root(root.path()).read().expect("read");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].kind, PowerSourceKind::InternalBattery);

        let stats = BatteryRule.derive(sources, None).expect("derived");
        assert_eq!(stats.level_percent, 50.0);
        assert_eq!(stats.minutes_remaining, 120);
    }

    #[test]
    fn sysfs_capacity_fallback_and_device_scope() {
        let root = TempDir::new().expect("tempdir");
        write_supply(
            root.path(),
            "hidpp_battery_0",
            &[("type", "Battery"), ("scope", "Device"), ("capacity", "10")],
        );
        write_supply(
            root.path(),
            "BAT1",
            &[("type", "Battery"), ("status", "Charging"), ("capacity", "77")],
        );

        let sources = PowerSupplyReader::with_root(root.path()).read().expect("read");
        let stats = BatteryRule.derive(sources, None).expect("derived");
        assert_eq!(stats.level_percent, 77.0);
        assert!(stats.charging);
        assert_eq!(stats.minutes_remaining, -1);
    }

    #[test]
    fn time_to_empty_now_is_in_seconds() {
        let root = TempDir::new().expect("tempdir");
        write_supply(
            root.path(),
            "BAT0",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("capacity", "60"),
                ("time_to_empty_now", "5400"),
            ],
        );
        let sources = PowerSupplyReader::with_root(root.path()).read().expect("read");
        assert_eq!(sources[0].minutes_to_empty, Some(90));
    }

    #[test]
    fn missing_root_is_io_error() {
        let mut reader = PowerSupplyReader::with_root("/nonexistent/power_supply");
        assert!(matches!(reader.read(), Err(SourceError::Io { .. })));
    }
}
