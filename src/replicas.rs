//! Cleanup of replicated snapshots on offline downstream volumes
//!
//! Replicas are never presented to a running VM, so there is no
//! virtualization-side guard here.

use crate::array::{ArraySnapshot, ArrayVolume, StorageArray};
use crate::audit::{AuditLevel, AuditLog, Procedure};
use crate::error::Result;
use crate::filter::SnapshotFilter;
use crate::progress::ProgressReporter;
use crate::purge::purge_snapshot;
use crate::report::{ReplicaReport, ReplicaVolumeReport};

/// Offline volumes acting as replication targets
pub fn replica_targets(volumes: &[ArrayVolume]) -> Vec<&ArrayVolume> {
    volumes
        .iter()
        .filter(|v| !v.online && v.is_replica_target())
        .collect()
}

/// Replicated snapshots on `volume` eligible under `filter`
pub fn replica_candidates(
    array: &dyn StorageArray,
    volume: &ArrayVolume,
    filter: &SnapshotFilter,
) -> Result<Vec<ArraySnapshot>> {
    Ok(array
        .list_snapshots(volume)?
        .into_iter()
        .filter(|s| s.is_replica && filter.matches(s))
        .collect())
}

/// Scan the array and delete matching replicated snapshots
///
/// Only the volume listing can fail the whole procedure; per-volume and
/// per-snapshot errors are recorded and the scan continues.
pub fn sweep_replicas(
    array: &dyn StorageArray,
    filter: &SnapshotFilter,
    dry_run: bool,
    audit: &mut AuditLog,
    progress: &mut ProgressReporter,
) -> Result<ReplicaReport> {
    let volumes = array.list_volumes()?;
    let targets = replica_targets(&volumes);
    log::info!("{} offline replica volumes on the array", targets.len());

    progress.start_items(targets.len() as u64, "Cleaning replicas");
    let mut report = ReplicaReport::default();

    for volume in targets {
        progress.advance(&volume.name);

        let candidates = match replica_candidates(array, volume, filter) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::error!("Failed to list snapshots on replica {}: {}", volume.name, e);
                audit.record(AuditLevel::Error, Procedure::Replicas, &volume.name, "list", "failed", &e.to_string());
                report.volumes.push(ReplicaVolumeReport {
                    volume: volume.name.clone(),
                    snapshots: Vec::new(),
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        if candidates.is_empty() {
            log::debug!("Replica {}: no snapshots match '{}'", volume.name, filter.pattern());
        }

        let snapshots = candidates
            .iter()
            .map(|snapshot| purge_snapshot(array, snapshot, dry_run, Procedure::Replicas, audit))
            .collect();

        report.volumes.push(ReplicaVolumeReport {
            volume: volume.name.clone(),
            snapshots,
            error: None,
        });
    }

    progress.finish_items("Replica cleanup complete");
    Ok(report)
}
