//! Output formatting utilities

use crate::error::Result;
use crate::report::{ReplicaReport, SnapshotAction, SnapshotOutcome, SweepReport, VmReport, VmStatus};
use crate::sweep::Survey;

/// Pretty printer for snapsweep output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the result of a sweep run
    pub fn print_sweep_report(report: &SweepReport) {
        let title = if report.dry_run { "🧪 Sweep (dry run)" } else { "🧹 Sweep" };
        println!("{} {}", title, report.run_id);

        if !report.vms.is_empty() {
            println!("├─ VMs:");
            for (i, vm) in report.vms.iter().enumerate() {
                let last = i == report.vms.len() - 1;
                Self::print_vm_report(vm, if last { "│  └─" } else { "│  ├─" });
            }
        }

        if let Some(replicas) = &report.replicas {
            Self::print_replica_report(replicas);
        }

        let summary = report.summary();
        println!("└─ Summary:");
        println!("   ├─ VMs examined: {}", summary.vms_examined);
        println!("   ├─ VMs skipped (active platform snapshot): {}", summary.vms_skipped);
        if summary.vms_failed > 0 {
            println!("   ├─ ❌ VMs failed: {}", summary.vms_failed);
        }
        if report.dry_run {
            println!("   ├─ Would delete: {}", summary.would_delete);
        } else {
            println!("   ├─ Deleted: {}", summary.deleted);
        }
        if summary.failed > 0 {
            println!("   ├─ ❌ Failed snapshots: {}", summary.failed);
        }
        println!("   └─ Space reclaimable: {}", format_bytes(summary.bytes_reclaimed));
    }

    fn print_vm_report(vm: &VmReport, prefix: &str) {
        let status = match &vm.status {
            VmStatus::Swept => format!("✅ {} snapshot(s) processed", vm.snapshots.len()),
            VmStatus::NothingToDelete => "nothing to delete".to_string(),
            VmStatus::NoArrayVolumes => "not on the array".to_string(),
            VmStatus::SkippedActiveSnapshot { holders } => {
                format!("⏭️  skipped, active platform snapshot on {}", holders.join(", "))
            }
            VmStatus::Failed { error } => format!("❌ {}", error),
        };
        println!("{} {}: {}", prefix, vm.vm, status);

        for outcome in &vm.snapshots {
            println!("│     {}", Self::describe_outcome(outcome));
        }
    }

    fn print_replica_report(replicas: &ReplicaReport) {
        println!("├─ Replica volumes:");
        if let Some(error) = &replicas.error {
            println!("│  └─ ❌ {}", error);
            return;
        }
        if replicas.volumes.is_empty() {
            println!("│  └─ none");
        }
        for (i, volume) in replicas.volumes.iter().enumerate() {
            let prefix = if i == replicas.volumes.len() - 1 { "│  └─" } else { "│  ├─" };
            match &volume.error {
                Some(error) => println!("{} {}: ❌ {}", prefix, volume.volume, error),
                None => println!("{} {}: {} snapshot(s)", prefix, volume.volume, volume.snapshots.len()),
            }
            for outcome in &volume.snapshots {
                println!("│     {}", Self::describe_outcome(outcome));
            }
        }
    }

    fn describe_outcome(outcome: &SnapshotOutcome) -> String {
        let name = format!("{}/{}", outcome.volume, outcome.snapshot);
        match &outcome.action {
            SnapshotAction::Deleted => format!("🗑️  {} deleted", name),
            SnapshotAction::WouldDelete => format!("•  {} would be deleted", name),
            SnapshotAction::Failed { stage, error } => format!("❌ {} {} failed: {}", name, stage, error),
        }
    }

    /// Print a read-only survey
    pub fn print_survey(survey: &Survey) {
        println!("📦 Array-backed datastores: {}", survey.datastores.len());
        for ds in &survey.datastores {
            println!("├─ {}", ds);
        }

        println!("🖥️  VMs: {}", survey.vms.len());
        for vm in &survey.vms {
            let guard = if vm.active_snapshot { " (active platform snapshot)" } else { "" };
            println!("├─ {} [{}]{}", vm.vm, vm.volumes.join(", "), guard);
            for snapshot in &vm.candidates {
                println!("│  └─ {}", snapshot.label());
            }
        }

        println!("🔁 Replica volumes: {}", survey.replicas.len());
        for replica in &survey.replicas {
            println!("├─ {}: {} eligible snapshot(s)", replica.volume, replica.candidates.len());
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Format a sweep report together with its summary
    pub fn format_sweep_report(report: &SweepReport) -> Result<String> {
        let json = serde_json::json!({
            "report": report,
            "summary": report.summary(),
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
