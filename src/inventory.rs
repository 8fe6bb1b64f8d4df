//! Discovery of array-backed datastores and the VMs living on them

use crate::array::{ArrayVolume, StorageArray};
use crate::error::Result;
use crate::filter::NameFilter;
use crate::vcenter::{Datastore, VirtualMachine, Virtualization};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

const DEVICE_PATH_PREFIX: &str = "/vmfs/devices/disks/";

/// Everything the per-VM procedure needs to know up front
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub volumes: Vec<ArrayVolume>,
    /// Datastores with at least one extent on the array
    pub datastores: Vec<Datastore>,
    pub vms: Vec<VirtualMachine>,
}

/// Lowercase a device identifier and strip path and `eui.`/`naa.` prefixes
pub fn normalize_device_id(id: &str) -> String {
    let lowered = id.trim().to_lowercase();
    let bare = lowered.strip_prefix(DEVICE_PATH_PREFIX).unwrap_or(lowered.as_str());
    let bare = bare
        .strip_prefix("eui.")
        .or_else(|| bare.strip_prefix("naa."))
        .unwrap_or(bare);
    bare.to_string()
}

/// True for `naa.` identifiers, with or without the device path prefix
fn is_naa(device: &str) -> bool {
    let lowered = device.trim().to_lowercase();
    lowered
        .strip_prefix(DEVICE_PATH_PREFIX)
        .unwrap_or(lowered.as_str())
        .starts_with("naa.")
}

/// Find the array volume presented as `device`
///
/// An exact serial match wins. Only NAA identifiers fall back to matching
/// on a serial suffix.
pub fn volume_for_device<'a>(volumes: &'a [ArrayVolume], device: &str) -> Option<&'a ArrayVolume> {
    let normalized = normalize_device_id(device);
    if normalized.is_empty() {
        return None;
    }

    if let Some(volume) = volumes.iter().find(|v| serial_of(v) == normalized) {
        return Some(volume);
    }
    if !is_naa(device) {
        return None;
    }

    volumes.iter().find(|v| {
        let serial = serial_of(v);
        !serial.is_empty() && normalized.ends_with(&serial)
    })
}

fn serial_of(volume: &ArrayVolume) -> String {
    volume.serial_number.trim().to_lowercase()
}

/// Enumerate array volumes, array-backed datastores and the VMs on them
///
/// Every VM on those datastores is kept, including ones a name filter would
/// exclude from sweeping, so the snapshot guard can see all volume sharers.
pub fn discover(array: &dyn StorageArray, vcenter: &dyn Virtualization) -> Result<Inventory> {
    let volumes = array.list_volumes()?;
    log::info!("Array reports {} volumes", volumes.len());

    let datastores: Vec<Datastore> = vcenter
        .list_datastores()?
        .into_iter()
        .filter(|ds| {
            ds.extents
                .iter()
                .any(|extent| volume_for_device(&volumes, extent).is_some())
        })
        .collect();
    log::info!("{} datastores are backed by the array", datastores.len());

    let mut vms: IndexMap<String, VirtualMachine> = IndexMap::new();
    for ds in &datastores {
        for vm_ref in vcenter.vms_on_datastore(ds)? {
            if vms.contains_key(&vm_ref.value) {
                continue;
            }
            let vm = vcenter.virtual_machine(&vm_ref)?;
            vms.insert(vm_ref.value.clone(), vm);
        }
    }
    log::info!("{} VMs live on array-backed datastores", vms.len());

    Ok(Inventory {
        volumes,
        datastores,
        vms: vms.into_values().collect(),
    })
}

impl Inventory {
    /// VMs the name filter admits for sweeping
    pub fn selected<'a>(&'a self, filter: &NameFilter) -> Vec<&'a VirtualMachine> {
        self.vms
            .iter()
            .filter(|vm| {
                let allowed = filter.allows(&vm.name);
                if !allowed {
                    log::debug!("VM {} excluded by name filter", vm.name);
                }
                allowed
            })
            .collect()
    }

    pub fn datastore(&self, id: &str) -> Option<&Datastore> {
        self.datastores.iter().find(|ds| ds.id == id)
    }

    /// Device identifiers backing the VM's configuration, disks and RDMs
    pub fn backing_devices(&self, vm: &VirtualMachine) -> Vec<String> {
        let mut devices: IndexSet<String> = IndexSet::new();

        for ds_id in &vm.datastore_ids {
            if let Some(ds) = self.datastore(ds_id) {
                devices.extend(ds.extents.iter().cloned());
            }
        }
        devices.extend(vm.rdm_devices.iter().cloned());

        devices.into_iter().collect()
    }

    /// Array volumes backing the VM, without duplicates, in discovery order
    pub fn backing_volumes(&self, vm: &VirtualMachine) -> Vec<&ArrayVolume> {
        let mut seen: IndexMap<&str, &ArrayVolume> = IndexMap::new();

        for device in self.backing_devices(vm) {
            match volume_for_device(&self.volumes, &device) {
                Some(volume) => {
                    seen.entry(volume.id.as_str()).or_insert(volume);
                }
                None => log::debug!("Device {} of VM {} is not on the array", device, vm.name),
            }
        }

        seen.into_values().collect()
    }

    /// Other inventoried VMs backed by any of `volume_ids`
    pub fn vms_sharing<'a>(&'a self, vm: &VirtualMachine, volume_ids: &[&str]) -> Vec<&'a VirtualMachine> {
        self.vms
            .iter()
            .filter(|other| other.id != vm.id)
            .filter(|other| {
                self.backing_volumes(other)
                    .iter()
                    .any(|volume| volume_ids.contains(&volume.id.as_str()))
            })
            .collect()
    }
}
