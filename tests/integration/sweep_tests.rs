//! End-to-end tests of the sweep orchestration and audit log

use crate::common::{lab, policy};
use snapsweep::audit::AuditLog;
use snapsweep::progress::ProgressReporter;
use snapsweep::report::VmStatus;
use snapsweep::sweep::{run, survey, SweepRequest, SweepScope};
use tempfile::TempDir;
use uuid::Uuid;

#[test]
fn test_full_run_covers_both_procedures() {
    let (array, mut vcenter) = lab();
    vcenter.active.insert("vm-2".to_string());
    let request = SweepRequest::new(policy(), SweepScope::All, false);

    let report = run(
        &array,
        &vcenter,
        &request,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    let summary = report.summary();
    assert_eq!(summary.vms_examined, 4);
    assert_eq!(summary.vms_skipped, 1);
    // web-snap-1, app-snap-1, rep-snap-1, rep-snap-2
    assert_eq!(summary.deleted, 4);
    assert_eq!(summary.bytes_reclaimed, 4 * 1024);
    assert!(!report.has_failures());
    assert!(report.finished.is_some());
    assert!(report.replicas.is_some());
}

#[test]
fn test_replica_listing_failure_keeps_vm_results() {
    let (mut array, vcenter) = lab();
    array.volume_listings_before_failure = Some(1);
    let request = SweepRequest::new(policy(), SweepScope::All, false);

    let report = run(
        &array,
        &vcenter,
        &request,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    assert!(!array.has_snapshot("web-snap-1"));
    // web-snap-1, db-snap-1, app-snap-1
    assert_eq!(report.summary().deleted, 3);
    let replicas = report.replicas.as_ref().unwrap();
    assert!(replicas.volumes.is_empty());
    assert!(replicas.error.as_deref().unwrap().contains("503"));
    assert!(report.has_failures());
    assert!(array.has_snapshot("rep-snap-1"));
}

#[test]
fn test_replica_scope_never_queries_vcenter() {
    let (array, vcenter) = lab();
    let request = SweepRequest::new(policy(), SweepScope::Replicas, false);

    let report = run(
        &array,
        &vcenter,
        &request,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    assert!(report.vms.is_empty());
    assert!(vcenter.queries().is_empty());
    assert!(array.has_snapshot("web-snap-1"));
    assert!(!array.has_snapshot("rep-snap-1"));
}

#[test]
fn test_vm_patterns_select_vms() {
    let (array, vcenter) = lab();
    let request = SweepRequest::new(policy(), SweepScope::Vms, false)
        .with_vm_patterns(vec!["WEB*".to_string()]);

    let report = run(
        &array,
        &vcenter,
        &request,
        &mut AuditLog::disabled(),
        &mut ProgressReporter::new_minimal(),
    )
    .unwrap();

    assert_eq!(report.vms.len(), 1);
    assert_eq!(report.vms[0].vm, "web01");
    assert_eq!(report.vms[0].status, VmStatus::Swept);
    assert!(array.has_snapshot("db-snap-1"));
}

#[test]
fn test_run_writes_audit_lines() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("snapsweep.log");
    let run_id = Uuid::new_v4();
    let mut audit = AuditLog::open(&log_path, run_id).unwrap();

    let (array, mut vcenter) = lab();
    vcenter.active.insert("vm-2".to_string());
    let request = SweepRequest::new(policy(), SweepScope::Vms, false);

    let report = run(&array, &vcenter, &request, &mut audit, &mut ProgressReporter::new_minimal()).unwrap();
    assert_eq!(report.run_id, run_id);
    drop(audit);

    let entries: Vec<serde_json::Value> = std::fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert!(entries.iter().all(|e| e["run_id"] == run_id.to_string()));
    assert!(entries
        .iter()
        .any(|e| e["target"] == "ds01-lun/web-snap-1" && e["action"] == "delete" && e["outcome"] == "deleted"));
    assert!(entries
        .iter()
        .any(|e| e["target"] == "db01" && e["action"] == "guard" && e["outcome"] == "skipped"));
    // app02 shares ds03-lun, already swept through app01
    assert!(entries
        .iter()
        .any(|e| e["target"] == "app02" && e["outcome"] == "nothing_to_delete"));
}

#[test]
fn test_survey_is_read_only() {
    let (array, mut vcenter) = lab();
    vcenter.active.insert("vm-1".to_string());
    let before = array.snapshot_names();
    let request = SweepRequest::new(policy(), SweepScope::All, true);

    let survey = survey(&array, &vcenter, &request, &mut ProgressReporter::new_minimal()).unwrap();

    assert!(array.calls().is_empty());
    assert_eq!(array.snapshot_names(), before);

    assert_eq!(survey.datastores, vec!["ds01", "ds02", "ds03"]);
    let web = survey.vms.iter().find(|v| v.vm == "web01").unwrap();
    assert!(web.active_snapshot);
    assert_eq!(web.candidates.len(), 1);
    assert_eq!(survey.replicas.len(), 1);
    assert_eq!(survey.replicas[0].candidates.len(), 2);
}

#[test]
fn test_vm_without_candidates_is_audited() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("snapsweep.log");
    let mut audit = AuditLog::open(&log_path, Uuid::new_v4()).unwrap();

    let (array, vcenter) = lab();
    array.snapshots.borrow_mut().retain(|s| s.name == "manual-keep");
    let request = SweepRequest::new(policy(), SweepScope::Vms, false)
        .with_vm_patterns(vec!["web01".to_string()]);

    run(&array, &vcenter, &request, &mut audit, &mut ProgressReporter::new_minimal()).unwrap();
    drop(audit);

    let entries: Vec<serde_json::Value> = std::fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let entry = entries
        .iter()
        .find(|e| e["target"] == "web01")
        .expect("no audit line for web01");
    assert_eq!(entry["action"], "filter");
    assert_eq!(entry["outcome"], "nothing_to_delete");
    assert!(entry["message"].as_str().unwrap().contains("*-snap-*"));
}
