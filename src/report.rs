//! Outcome records produced by a sweep run

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Stage at which a snapshot operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Offline,
    Delete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Offline => write!(f, "offline"),
            Stage::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SnapshotAction {
    Deleted,
    WouldDelete,
    Failed { stage: Stage, error: String },
}

/// What happened to one array snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotOutcome {
    pub volume: String,
    pub snapshot: String,
    pub bytes: u64,
    #[serde(flatten)]
    pub action: SnapshotAction,
}

impl SnapshotOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.action, SnapshotAction::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VmStatus {
    /// Matching snapshots were processed
    Swept,
    /// Backing volumes hold no eligible snapshots
    NothingToDelete,
    /// None of the VM's storage lives on the array
    NoArrayVolumes,
    /// A platform snapshot on this VM or a VM sharing its volumes is live
    SkippedActiveSnapshot { holders: Vec<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmReport {
    pub vm: String,
    pub volumes: Vec<String>,
    #[serde(flatten)]
    pub status: VmStatus,
    pub snapshots: Vec<SnapshotOutcome>,
}

impl VmReport {
    pub fn new(vm: impl Into<String>, volumes: Vec<String>, status: VmStatus) -> Self {
        Self {
            vm: vm.into(),
            volumes,
            status,
            snapshots: Vec::new(),
        }
    }
}

/// Replica snapshots handled on one downstream volume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicaVolumeReport {
    pub volume: String,
    pub snapshots: Vec<SnapshotOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplicaReport {
    pub volumes: Vec<ReplicaVolumeReport>,
    /// Set when the replica volumes could not be listed at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full record of one run
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub vms: Vec<VmReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<ReplicaReport>,
}

/// Aggregate counts for the summary line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub vms_examined: usize,
    pub vms_skipped: usize,
    pub vms_failed: usize,
    pub replica_volumes: usize,
    pub deleted: usize,
    pub would_delete: usize,
    pub failed: usize,
    pub bytes_reclaimed: u64,
}

impl SweepReport {
    pub fn new(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            started: Utc::now(),
            finished: None,
            dry_run,
            vms: Vec::new(),
            replicas: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished = Some(Utc::now());
    }

    fn all_snapshots(&self) -> impl Iterator<Item = &SnapshotOutcome> {
        let vm_snapshots = self.vms.iter().flat_map(|vm| vm.snapshots.iter());
        let replica_snapshots = self
            .replicas
            .iter()
            .flat_map(|r| r.volumes.iter())
            .flat_map(|v| v.snapshots.iter());
        vm_snapshots.chain(replica_snapshots)
    }

    pub fn summary(&self) -> SweepSummary {
        let mut summary = SweepSummary {
            vms_examined: self.vms.len(),
            ..Default::default()
        };

        for vm in &self.vms {
            match vm.status {
                VmStatus::SkippedActiveSnapshot { .. } => summary.vms_skipped += 1,
                VmStatus::Failed { .. } => summary.vms_failed += 1,
                _ => {}
            }
        }

        if let Some(replicas) = &self.replicas {
            summary.replica_volumes = replicas.volumes.len();
        }

        for outcome in self.all_snapshots() {
            match outcome.action {
                SnapshotAction::Deleted => {
                    summary.deleted += 1;
                    summary.bytes_reclaimed += outcome.bytes;
                }
                SnapshotAction::WouldDelete => {
                    summary.would_delete += 1;
                    summary.bytes_reclaimed += outcome.bytes;
                }
                SnapshotAction::Failed { .. } => summary.failed += 1,
            }
        }

        summary
    }

    /// Any per-item failure: a failed snapshot, VM or replica volume
    pub fn has_failures(&self) -> bool {
        let replica_errors = self
            .replicas
            .as_ref()
            .map(|r| r.error.is_some() || r.volumes.iter().any(|v| v.error.is_some()))
            .unwrap_or(false);

        replica_errors
            || self.vms.iter().any(|vm| matches!(vm.status, VmStatus::Failed { .. }))
            || self.all_snapshots().any(SnapshotOutcome::is_failure)
    }
}
