//! Root volume usage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sysinfo::Disks;

use super::{Derivation, RawReader};
use crate::constants::ONE_GIB;
use crate::error::SourceError;
use crate::models::{DiskStats, MetricId, SourceKind, StatsSnapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskReading {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Default)]
pub struct DiskRule;

impl Derivation for DiskRule {
    type Raw = DiskReading;
    type Value = DiskStats;

    fn kind(&self) -> SourceKind {
        SourceKind::Disk
    }

    fn baseline(&self) -> DiskStats {
        DiskStats::default()
    }

    fn derive(&mut self, raw: DiskReading, _elapsed: Option<Duration>) -> Option<DiskStats> {
        if raw.total_bytes == 0 {
            return None;
        }
        let total = raw.total_bytes as f64;
        let free = raw.available_bytes.min(raw.total_bytes) as f64;
        Some(DiskStats {
            usage_percent: ((total - free) / total * 100.0).clamp(0.0, 100.0),
            free_gb: free / ONE_GIB,
        })
    }

    fn publish(&self, value: &DiskStats, snapshot: &mut StatsSnapshot) {
        snapshot.disk = value.clone();
    }

    fn history_points(&self, value: &DiskStats) -> Vec<(MetricId, f64)> {
        vec![(MetricId::DiskUsage, value.usage_percent)]
    }
}

/// Reads the volume mounted at a path (the root volume by default) via sysinfo.
pub struct VolumeReader {
    disks: Disks,
    mount_point: PathBuf,
}

impl VolumeReader {
    pub fn root() -> Self {
        Self::new("/")
    }

    pub fn new(mount_point: impl AsRef<Path>) -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
            mount_point: mount_point.as_ref().to_path_buf(),
        }
    }

    fn find(&self) -> Option<DiskReading> {
        self.disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.mount_point)
            .map(|d| DiskReading {
                total_bytes: d.total_space(),
                available_bytes: d.available_space(),
            })
    }
}

impl RawReader<DiskReading> for VolumeReader {
    fn read(&mut self) -> Result<DiskReading, SourceError> {
        self.disks.refresh();
        if let Some(reading) = self.find() {
            return Ok(reading);
        }
        // Volume may have been remounted; rebuild the list once
        self.disks = Disks::new_with_refreshed_list();
        self.find()
            .ok_or(SourceError::Unavailable("root volume"))
    }
}
