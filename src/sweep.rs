//! Top-level sweep orchestration over the two management services

use crate::array::{ArraySnapshot, StorageArray};
use crate::audit::{AuditLevel, AuditLog, Procedure};
use crate::config::SweepPolicy;
use crate::error::Result;
use crate::filter::{NameFilter, SnapshotFilter};
use crate::inventory::{self, Inventory};
use crate::progress::ProgressReporter;
use crate::reconcile::VmReconciler;
use crate::replicas;
use crate::report::{ReplicaReport, SweepReport};
use crate::vcenter::Virtualization;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which procedures a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepScope {
    Vms,
    Replicas,
    All,
}

impl SweepScope {
    pub fn includes_vms(self) -> bool {
        matches!(self, SweepScope::Vms | SweepScope::All)
    }

    pub fn includes_replicas(self) -> bool {
        matches!(self, SweepScope::Replicas | SweepScope::All)
    }
}

/// Parameters of one run
#[derive(Debug, Clone)]
pub struct SweepRequest {
    pub policy: SweepPolicy,
    pub scope: SweepScope,
    pub dry_run: bool,
    pub now: DateTime<Utc>,
}

impl SweepRequest {
    pub fn new(policy: SweepPolicy, scope: SweepScope, dry_run: bool) -> Self {
        Self {
            policy,
            scope,
            dry_run,
            now: Utc::now(),
        }
    }

    /// Replace the configured VM include list, e.g. from `--vm`
    pub fn with_vm_patterns(mut self, patterns: Vec<String>) -> Self {
        if !patterns.is_empty() {
            self.policy.vm_include = patterns;
        }
        self
    }

    fn vm_filter(&self) -> Result<NameFilter> {
        NameFilter::new(&self.policy.vm_include, &self.policy.vm_exclude)
    }

    fn snapshot_filter(&self) -> Result<SnapshotFilter> {
        SnapshotFilter::new(&self.policy.snapshot_pattern, self.policy.min_age_hours, self.now)
    }

    fn replica_filter(&self) -> Result<SnapshotFilter> {
        SnapshotFilter::new(
            &self.policy.replica_snapshot_pattern,
            self.policy.min_age_hours,
            self.now,
        )
    }
}

/// Run the requested procedures and collect a report
pub fn run(
    array: &dyn StorageArray,
    vcenter: &dyn Virtualization,
    request: &SweepRequest,
    audit: &mut AuditLog,
    progress: &mut ProgressReporter,
) -> Result<SweepReport> {
    let mut report = SweepReport::new(audit.run_id(), request.dry_run);

    if request.scope.includes_vms() {
        let vm_filter = request.vm_filter()?;
        let snapshot_filter = request.snapshot_filter()?;

        progress.start_discovery("Discovering array-backed datastores and VMs...");
        let inventory = inventory::discover(array, vcenter)?;
        progress.finish_discovery(&format!(
            "Found {} datastores and {} VMs on the array",
            inventory.datastores.len(),
            inventory.vms.len()
        ));

        let mut reconciler = VmReconciler::new(
            array,
            vcenter,
            &inventory,
            &snapshot_filter,
            &vm_filter,
            request.dry_run,
        );
        report.vms = reconciler.reconcile_all(audit, progress);
    }

    if request.scope.includes_replicas() {
        let replica_filter = request.replica_filter()?;
        let replica_report =
            match replicas::sweep_replicas(array, &replica_filter, request.dry_run, audit, progress) {
                Ok(replica_report) => replica_report,
                // VM deletions may already have happened; keep their report
                Err(e) => {
                    log::error!("Replica cleanup failed: {}", e);
                    audit.record(AuditLevel::Error, Procedure::Replicas, "array", "list", "failed", &e.to_string());
                    ReplicaReport {
                        error: Some(e.to_string()),
                        ..Default::default()
                    }
                }
            };
        report.replicas = Some(replica_report);
    }

    report.finish();
    Ok(report)
}

/// A VM with the snapshots a sweep would consider
#[derive(Debug, Clone, Serialize)]
pub struct VmSurvey {
    pub vm: String,
    pub volumes: Vec<String>,
    pub active_snapshot: bool,
    pub candidates: Vec<ArraySnapshot>,
}

/// A replica volume with the snapshots a sweep would consider
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaSurvey {
    pub volume: String,
    pub candidates: Vec<ArraySnapshot>,
}

/// Read-only view of what a sweep would touch
#[derive(Debug, Clone, Serialize)]
pub struct Survey {
    pub datastores: Vec<String>,
    pub vms: Vec<VmSurvey>,
    pub replicas: Vec<ReplicaSurvey>,
}

/// Enumerate everything without offlining or deleting
pub fn survey(
    array: &dyn StorageArray,
    vcenter: &dyn Virtualization,
    request: &SweepRequest,
    progress: &mut ProgressReporter,
) -> Result<Survey> {
    let vm_filter = request.vm_filter()?;
    let snapshot_filter = request.snapshot_filter()?;
    let replica_filter = request.replica_filter()?;

    progress.start_discovery("Discovering array-backed datastores and VMs...");
    let inventory: Inventory = inventory::discover(array, vcenter)?;
    progress.finish_discovery("Discovery complete");

    let mut vms = Vec::new();
    for vm in inventory.selected(&vm_filter) {
        let volumes = inventory.backing_volumes(vm);
        let mut candidates = Vec::new();
        for volume in &volumes {
            candidates.extend(
                array
                    .list_snapshots(volume)?
                    .into_iter()
                    .filter(|s| snapshot_filter.matches(s)),
            );
        }

        vms.push(VmSurvey {
            vm: vm.name.clone(),
            volumes: volumes.iter().map(|v| v.name.clone()).collect(),
            active_snapshot: vcenter.has_active_snapshot(vm)?,
            candidates,
        });
    }

    let mut replica_surveys = Vec::new();
    for volume in replicas::replica_targets(&inventory.volumes) {
        replica_surveys.push(ReplicaSurvey {
            volume: volume.name.clone(),
            candidates: replicas::replica_candidates(array, volume, &replica_filter)?,
        });
    }

    Ok(Survey {
        datastores: inventory.datastores.iter().map(|ds| ds.name.clone()).collect(),
        vms,
        replicas: replica_surveys,
    })
}
