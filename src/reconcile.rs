//! Per-VM reconciliation of array snapshots against live platform snapshots

use crate::array::{ArraySnapshot, ArrayVolume, StorageArray};
use crate::audit::{AuditLevel, AuditLog, Procedure};
use crate::error::Result;
use crate::filter::{NameFilter, SnapshotFilter};
use crate::inventory::Inventory;
use crate::progress::ProgressReporter;
use crate::purge::purge_snapshot;
use crate::report::{VmReport, VmStatus};
use crate::vcenter::{VirtualMachine, Virtualization};
use std::collections::HashSet;

/// Walks inventoried VMs and deletes their stale array snapshots
pub struct VmReconciler<'a> {
    array: &'a dyn StorageArray,
    vcenter: &'a dyn Virtualization,
    inventory: &'a Inventory,
    filter: &'a SnapshotFilter,
    vm_filter: &'a NameFilter,
    dry_run: bool,
    /// Volumes already handled in this run, by id
    swept_volumes: HashSet<String>,
}

impl<'a> VmReconciler<'a> {
    pub fn new(
        array: &'a dyn StorageArray,
        vcenter: &'a dyn Virtualization,
        inventory: &'a Inventory,
        filter: &'a SnapshotFilter,
        vm_filter: &'a NameFilter,
        dry_run: bool,
    ) -> Self {
        Self {
            array,
            vcenter,
            inventory,
            filter,
            vm_filter,
            dry_run,
            swept_volumes: HashSet::new(),
        }
    }

    /// Reconcile every selected VM in discovery order
    pub fn reconcile_all(&mut self, audit: &mut AuditLog, progress: &mut ProgressReporter) -> Vec<VmReport> {
        let inventory = self.inventory;
        let selected = inventory.selected(self.vm_filter);
        progress.start_items(selected.len() as u64, "Reconciling VMs");

        let mut reports = Vec::with_capacity(selected.len());
        for vm in selected {
            progress.advance(&vm.name);
            reports.push(self.reconcile_vm(vm, audit));
        }

        progress.finish_items("VM reconciliation complete");
        reports
    }

    /// Reconcile one VM: resolve volumes, filter snapshots, guard, purge
    pub fn reconcile_vm(&mut self, vm: &VirtualMachine, audit: &mut AuditLog) -> VmReport {
        let inventory = self.inventory;
        let volumes = inventory.backing_volumes(vm);
        let volume_names: Vec<String> = volumes.iter().map(|v| v.name.clone()).collect();

        if volumes.is_empty() {
            log::info!("VM {} has no storage on the array", vm.name);
            audit.record(AuditLevel::Info, Procedure::Reconcile, &vm.name, "resolve", "no_array_volumes", "");
            return VmReport::new(vm.name.clone(), volume_names, VmStatus::NoArrayVolumes);
        }

        let fresh: Vec<&ArrayVolume> = volumes
            .into_iter()
            .filter(|v| !self.swept_volumes.contains(&v.id))
            .collect();
        if fresh.is_empty() {
            log::debug!("All volumes of VM {} were already swept in this run", vm.name);
            audit.record(
                AuditLevel::Info,
                Procedure::Reconcile,
                &vm.name,
                "filter",
                "nothing_to_delete",
                "volumes already swept in this run",
            );
            return VmReport::new(vm.name.clone(), volume_names, VmStatus::NothingToDelete);
        }

        let candidates = match self.candidates(&fresh) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::error!("Failed to list snapshots for VM {}: {}", vm.name, e);
                audit.record(AuditLevel::Error, Procedure::Reconcile, &vm.name, "list", "failed", &e.to_string());
                return VmReport::new(vm.name.clone(), volume_names, VmStatus::Failed { error: e.to_string() });
            }
        };

        if candidates.is_empty() {
            let message = format!("no snapshots match '{}'", self.filter.pattern());
            log::info!("VM {}: {}", vm.name, message);
            audit.record(AuditLevel::Info, Procedure::Reconcile, &vm.name, "filter", "nothing_to_delete", &message);
            self.mark_swept(&fresh);
            return VmReport::new(vm.name.clone(), volume_names, VmStatus::NothingToDelete);
        }

        let fresh_ids: Vec<&str> = fresh.iter().map(|v| v.id.as_str()).collect();
        let holders = match self.snapshot_holders(vm, &fresh_ids) {
            Ok(holders) => holders,
            Err(e) => {
                log::error!("Could not verify platform snapshots for VM {}: {}", vm.name, e);
                audit.record(AuditLevel::Error, Procedure::Reconcile, &vm.name, "guard", "failed", &e.to_string());
                return VmReport::new(vm.name.clone(), volume_names, VmStatus::Failed { error: e.to_string() });
            }
        };

        if !holders.is_empty() {
            let message = format!("active platform snapshot on {}", holders.join(", "));
            log::warn!("Skipping VM {}: {}", vm.name, message);
            audit.record(AuditLevel::Warn, Procedure::Reconcile, &vm.name, "guard", "skipped", &message);
            return VmReport::new(vm.name.clone(), volume_names, VmStatus::SkippedActiveSnapshot { holders });
        }

        let mut report = VmReport::new(vm.name.clone(), volume_names, VmStatus::Swept);
        for snapshot in &candidates {
            report.snapshots.push(purge_snapshot(
                self.array,
                snapshot,
                self.dry_run,
                Procedure::Reconcile,
                audit,
            ));
        }
        self.mark_swept(&fresh);

        report
    }

    /// Matching snapshots across the given volumes
    fn candidates(&self, volumes: &[&ArrayVolume]) -> Result<Vec<ArraySnapshot>> {
        let mut candidates = Vec::new();
        for volume in volumes {
            let snapshots = self.array.list_snapshots(volume)?;
            log::debug!("Volume {} has {} snapshots", volume.name, snapshots.len());
            candidates.extend(snapshots.into_iter().filter(|s| self.filter.matches(s)));
        }
        Ok(candidates)
    }

    /// Names of VMs with a live platform snapshot among `vm` and every VM
    /// sharing one of `volume_ids`
    fn snapshot_holders(&self, vm: &VirtualMachine, volume_ids: &[&str]) -> Result<Vec<String>> {
        let mut holders = Vec::new();

        let sharing = self.inventory.vms_sharing(vm, volume_ids);
        for candidate in std::iter::once(vm).chain(sharing) {
            if self.vcenter.has_active_snapshot(candidate)? {
                holders.push(candidate.name.clone());
            }
        }

        Ok(holders)
    }

    fn mark_swept(&mut self, volumes: &[&ArrayVolume]) {
        self.swept_volumes.extend(volumes.iter().map(|v| v.id.clone()));
    }
}
