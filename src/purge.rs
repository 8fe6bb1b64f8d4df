//! Offline-then-delete of a single array snapshot

use crate::array::{ArraySnapshot, StorageArray};
use crate::audit::{AuditLevel, AuditLog, Procedure};
use crate::report::{SnapshotAction, SnapshotOutcome, Stage};

/// Remove one snapshot, taking it offline first when it is still online
///
/// Errors are captured in the returned outcome; the caller moves on to the
/// next snapshot regardless.
pub fn purge_snapshot(
    array: &dyn StorageArray,
    snapshot: &ArraySnapshot,
    dry_run: bool,
    procedure: Procedure,
    audit: &mut AuditLog,
) -> SnapshotOutcome {
    let target = snapshot.label();
    let outcome = |action| SnapshotOutcome {
        volume: snapshot.vol_name.clone(),
        snapshot: snapshot.name.clone(),
        bytes: snapshot.new_data_compressed_bytes.unwrap_or(0),
        action,
    };

    if dry_run {
        log::info!("[dry-run] Would delete snapshot {}", target);
        audit.record(AuditLevel::Info, procedure, &target, "delete", "would_delete", "dry run");
        return outcome(SnapshotAction::WouldDelete);
    }

    if snapshot.online {
        if let Err(e) = array.offline_snapshot(snapshot) {
            log::error!("Failed to offline snapshot {}: {}", target, e);
            audit.record(AuditLevel::Error, procedure, &target, "offline", "failed", &e.to_string());
            return outcome(SnapshotAction::Failed {
                stage: Stage::Offline,
                error: e.to_string(),
            });
        }
        log::debug!("Snapshot {} is offline", target);
        audit.record(AuditLevel::Info, procedure, &target, "offline", "ok", "");
    }

    match array.delete_snapshot(snapshot) {
        Ok(()) => {
            log::info!("Deleted snapshot {}", target);
            audit.record(AuditLevel::Info, procedure, &target, "delete", "deleted", "");
            outcome(SnapshotAction::Deleted)
        }
        Err(e) => {
            log::error!("Failed to delete snapshot {}: {}", target, e);
            audit.record(AuditLevel::Error, procedure, &target, "delete", "failed", &e.to_string());
            outcome(SnapshotAction::Failed {
                stage: Stage::Delete,
                error: e.to_string(),
            })
        }
    }
}
