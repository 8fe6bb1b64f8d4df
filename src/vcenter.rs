//! Virtualization manager binding over the vSphere VI/JSON API

use crate::config::VcenterConfig;
use crate::error::{Result, SweepError};
use crate::session;
use indexmap::IndexMap;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "vcenter";
const SESSION_HEADER: &str = "vmware-api-session-id";
const RDM_BACKING_PREFIX: &str = "VirtualDiskRawDisk";

/// Managed object reference, e.g. `Datastore:datastore-12`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl MoRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// A datastore with the device identifiers of its VMFS extents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datastore {
    pub id: String,
    pub name: String,
    pub extents: Vec<String>,
}

impl Datastore {
    pub fn moref(&self) -> MoRef {
        MoRef::new("Datastore", self.id.clone())
    }
}

/// A virtual machine and the storage it touches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    /// Datastores holding the VM's configuration and disks
    pub datastore_ids: Vec<String>,
    /// Raw device mapped LUNs, by device identifier
    pub rdm_devices: Vec<String>,
}

impl VirtualMachine {
    pub fn moref(&self) -> MoRef {
        MoRef::new("VirtualMachine", self.id.clone())
    }
}

/// Operations the sweep needs from the virtualization manager
pub trait Virtualization {
    fn list_datastores(&self) -> Result<Vec<Datastore>>;
    fn vms_on_datastore(&self, datastore: &Datastore) -> Result<Vec<MoRef>>;
    fn virtual_machine(&self, vm: &MoRef) -> Result<VirtualMachine>;
    /// Live check for a platform-level snapshot; never served from cache
    fn has_active_snapshot(&self, vm: &VirtualMachine) -> Result<bool>;
    fn disconnect(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceContent {
    root_folder: MoRef,
}

#[derive(Debug, Default, Deserialize)]
struct DatastoreInfo {
    #[serde(default)]
    vmfs: Option<VmfsVolume>,
}

#[derive(Debug, Default, Deserialize)]
struct VmfsVolume {
    #[serde(default)]
    extent: Vec<DiskPartition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskPartition {
    disk_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct VmConfigInfo {
    #[serde(default)]
    hardware: Option<VmHardware>,
}

#[derive(Debug, Default, Deserialize)]
struct VmHardware {
    #[serde(default)]
    device: Vec<VirtualDevice>,
}

#[derive(Debug, Deserialize)]
struct VirtualDevice {
    #[serde(default)]
    backing: Option<DeviceBacking>,
}

#[derive(Debug, Deserialize)]
struct DeviceBacking {
    #[serde(rename = "_typeName", default)]
    type_name: String,
    #[serde(rename = "deviceName", default)]
    device_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotInfo {
    #[serde(default)]
    root_snapshot_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fault {
    #[serde(default)]
    localized_message: Option<String>,
    #[serde(rename = "_typeName", default)]
    type_name: Option<String>,
}

/// VI/JSON client holding an authenticated vCenter session
#[derive(Debug)]
pub struct VcenterClient {
    http: HttpClient,
    api_root: String,
    session_id: String,
}

impl VcenterClient {
    /// Log in through the session manager
    pub fn connect(config: &VcenterConfig, password: &str) -> Result<Self> {
        let http = session::http_client(&config.endpoint)?;
        let api_root = format!(
            "{}/sdk/vim25/{}",
            session::base_url(&config.endpoint.url),
            config.api_release.trim()
        );

        let body = serde_json::json!({
            "userName": config.endpoint.username,
            "password": password,
        });
        let response = http
            .post(format!("{}/SessionManager/SessionManager/Login", api_root))
            .json(&body)
            .send()?;
        let response = check_response(response)?;

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                SweepError::api(SERVICE, response.status().as_u16(), "login returned no session id")
            })?;

        log::info!(
            "Opened vCenter session on {} as {}",
            config.endpoint.url,
            config.endpoint.username
        );

        Ok(Self {
            http,
            api_root,
            session_id,
        })
    }

    fn property_url(&self, object: &MoRef, property: &str) -> String {
        format!("{}/{}/{}/{}", self.api_root, object.kind, object.value, property)
    }

    fn fetch(&self, object: &MoRef, property: &str) -> Result<String> {
        let response = self
            .http
            .get(self.property_url(object, property))
            .header(SESSION_HEADER, &self.session_id)
            .send()?;
        Ok(check_response(response)?.text()?)
    }

    /// Read a property that is always set
    fn property<T: DeserializeOwned>(&self, object: &MoRef, property: &str) -> Result<T> {
        let body = self.fetch(object, property)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Read a property that may be unset (empty body or JSON null)
    fn optional_property<T: DeserializeOwned>(&self, object: &MoRef, property: &str) -> Result<Option<T>> {
        let body = self.fetch(object, property)?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str::<Option<T>>(&body)?)
    }

    /// Every datastore reachable from the inventory root
    fn datastore_refs(&self) -> Result<Vec<MoRef>> {
        let content: ServiceContent =
            self.property(&MoRef::new("ServiceInstance", "ServiceInstance"), "content")?;

        let mut pending = vec![content.root_folder];
        let mut datastores: IndexMap<String, MoRef> = IndexMap::new();

        while let Some(entity) = pending.pop() {
            match entity.kind.as_str() {
                "Folder" => {
                    let children: Vec<MoRef> = self.property(&entity, "childEntity")?;
                    pending.extend(children);
                }
                "Datacenter" => {
                    let refs: Vec<MoRef> = self.property(&entity, "datastore")?;
                    for ds in refs {
                        datastores.entry(ds.value.clone()).or_insert(ds);
                    }
                }
                _ => {}
            }
        }

        Ok(datastores.into_values().collect())
    }
}

impl Virtualization for VcenterClient {
    fn list_datastores(&self) -> Result<Vec<Datastore>> {
        let mut datastores = Vec::new();

        for ds in self.datastore_refs()? {
            let name: String = self.property(&ds, "name")?;
            let info: DatastoreInfo = self.optional_property(&ds, "info")?.unwrap_or_default();
            let extents = info
                .vmfs
                .map(|vmfs| vmfs.extent.into_iter().map(|e| e.disk_name).collect())
                .unwrap_or_default();

            datastores.push(Datastore {
                id: ds.value,
                name,
                extents,
            });
        }

        Ok(datastores)
    }

    fn vms_on_datastore(&self, datastore: &Datastore) -> Result<Vec<MoRef>> {
        self.property(&datastore.moref(), "vm")
    }

    fn virtual_machine(&self, vm: &MoRef) -> Result<VirtualMachine> {
        let name: String = self.property(vm, "name")?;
        let datastores: Vec<MoRef> = self.property(vm, "datastore")?;
        let config: VmConfigInfo = self.optional_property(vm, "config")?.unwrap_or_default();

        let rdm_devices = config
            .hardware
            .map(|hw| {
                hw.device
                    .into_iter()
                    .filter_map(|device| device.backing)
                    .filter(|backing| backing.type_name.starts_with(RDM_BACKING_PREFIX))
                    .filter_map(|backing| backing.device_name)
                    .collect()
            })
            .unwrap_or_default();

        Ok(VirtualMachine {
            id: vm.value.clone(),
            name,
            datastore_ids: datastores.into_iter().map(|ds| ds.value).collect(),
            rdm_devices,
        })
    }

    fn has_active_snapshot(&self, vm: &VirtualMachine) -> Result<bool> {
        let info: Option<SnapshotInfo> = self.optional_property(&vm.moref(), "snapshot")?;
        Ok(info.map(|i| !i.root_snapshot_list.is_empty()).unwrap_or(false))
    }

    fn disconnect(&self) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/SessionManager/SessionManager/Logout", self.api_root))
            .header(SESSION_HEADER, &self.session_id)
            .send()?;
        check_response(response)?;
        log::debug!("Closed vCenter session");
        Ok(())
    }
}

/// Turn non-2xx responses into API errors carrying the fault message
fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<Fault>(&body)
        .ok()
        .and_then(|fault| fault.localized_message.or(fault.type_name))
        .unwrap_or(body);

    Err(SweepError::api(SERVICE, status.as_u16(), message))
}
