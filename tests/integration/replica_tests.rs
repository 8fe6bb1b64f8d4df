//! Integration tests for replica cleanup

use crate::common::{lab, policy, replica_volume, snapshot};
use chrono::Utc;
use snapsweep::audit::AuditLog;
use snapsweep::filter::SnapshotFilter;
use snapsweep::progress::ProgressReporter;
use snapsweep::replicas::sweep_replicas;
use snapsweep::report::{SnapshotAction, Stage};

fn replica_filter(pattern: &str) -> SnapshotFilter {
    SnapshotFilter::new(pattern, policy().min_age_hours, Utc::now()).unwrap()
}

#[test]
fn test_replicated_snapshots_are_deleted() {
    let (array, _vcenter) = lab();

    let report = sweep_replicas(
        &array,
        &replica_filter("*"),
        false,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    assert_eq!(report.volumes.len(), 1);
    let volume = &report.volumes[0];
    assert_eq!(volume.volume, "ds01-lun-replica");
    assert!(volume.error.is_none());
    assert!(volume
        .snapshots
        .iter()
        .all(|s| s.action == SnapshotAction::Deleted));

    // Already offline snapshots are deleted directly
    let calls = array.calls();
    assert!(!calls.contains(&"offline:s-rep-1".to_string()));
    assert!(calls.contains(&"delete:s-rep-1".to_string()));
    assert!(calls.contains(&"offline:s-rep-2".to_string()));
    assert!(calls.contains(&"delete:s-rep-2".to_string()));

    // Upstream volumes are never touched
    assert!(array.has_snapshot("web-snap-1"));
    assert!(array.has_snapshot("db-snap-1"));
}

#[test]
fn test_replica_pattern_limits_deletion() {
    let (array, _vcenter) = lab();

    let report = sweep_replicas(
        &array,
        &replica_filter("*-snap-1"),
        false,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    assert_eq!(report.volumes[0].snapshots.len(), 1);
    assert!(!array.has_snapshot("rep-snap-1"));
    assert!(array.has_snapshot("rep-snap-2"));
}

#[test]
fn test_replica_listing_failure_continues_with_other_volumes() {
    let (mut array, _vcenter) = lab();
    let second = replica_volume("vol-r2", "ds02-lun-replica", "eeee5555");
    array
        .snapshots
        .borrow_mut()
        .push(snapshot("s-rep-3", "rep-snap-3", &second, false, 48));
    array.volumes.push(second);
    array.fail_list.insert("vol-r".to_string());

    let report = sweep_replicas(
        &array,
        &replica_filter("*"),
        false,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    assert_eq!(report.volumes.len(), 2);
    assert!(report.volumes[0].error.is_some());
    assert_eq!(report.volumes[1].snapshots[0].action, SnapshotAction::Deleted);
    assert!(!array.has_snapshot("rep-snap-3"));
}

#[test]
fn test_replica_delete_failure_is_recorded() {
    let (mut array, _vcenter) = lab();
    array.fail_delete.insert("s-rep-1".to_string());

    let report = sweep_replicas(
        &array,
        &replica_filter("*"),
        false,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    let outcomes = &report.volumes[0].snapshots;
    assert!(matches!(
        &outcomes[0].action,
        SnapshotAction::Failed { stage: Stage::Delete, .. }
    ));
    assert_eq!(outcomes[1].action, SnapshotAction::Deleted);
}

#[test]
fn test_replica_dry_run() {
    let (array, _vcenter) = lab();

    let report = sweep_replicas(
        &array,
        &replica_filter("*"),
        true,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    assert!(array.calls().is_empty());
    assert!(report.volumes[0]
        .snapshots
        .iter()
        .all(|s| s.action == SnapshotAction::WouldDelete));
}
