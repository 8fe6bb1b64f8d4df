//! vCenter VI/JSON client against a mock server

use crate::common::config_for;
use mockito::{Matcher, Mock, ServerGuard};
use snapsweep::{Datastore, MoRef, SweepError, VcenterClient, VirtualMachine, Virtualization};

const API: &str = "/sdk/vim25/8.0.1.0";
const SESSION: &str = "vc-session-1";

fn path(rest: &str) -> String {
    format!("{}/{}", API, rest)
}

fn mock_login(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", path("SessionManager/SessionManager/Login").as_str())
        .match_body(Matcher::PartialJson(serde_json::json!({ "password": "vc-secret" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("vmware-api-session-id", SESSION)
        .with_body(r#"{"_typeName":"UserSession","key":"52a1","userName":"administrator@vsphere.local"}"#)
        .create()
}

fn mock_property(server: &mut ServerGuard, rest: &str, body: &str) -> Mock {
    server
        .mock("GET", path(rest).as_str())
        .match_header("vmware-api-session-id", SESSION)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}

fn connect(server: &mut ServerGuard) -> VcenterClient {
    let config = config_for(&server.url());
    VcenterClient::connect(&config.vcenter, "vc-secret").unwrap()
}

fn vm(id: &str) -> VirtualMachine {
    VirtualMachine {
        id: id.to_string(),
        name: "web01".to_string(),
        datastore_ids: Vec::new(),
        rdm_devices: Vec::new(),
    }
}

#[test]
fn test_login_without_session_header_fails() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", path("SessionManager/SessionManager/Login").as_str())
        .with_status(200)
        .with_body("{}")
        .create();

    let config = config_for(&server.url());
    let err = VcenterClient::connect(&config.vcenter, "vc-secret").unwrap_err();
    assert!(err.to_string().contains("no session id"));
}

#[test]
fn test_list_datastores_walks_inventory() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);

    mock_property(
        &mut server,
        "ServiceInstance/ServiceInstance/content",
        r#"{"_typeName":"ServiceContent","rootFolder":{"_typeName":"ManagedObjectReference","type":"Folder","value":"group-d1"}}"#,
    );
    mock_property(
        &mut server,
        "Folder/group-d1/childEntity",
        r#"[{"type":"Datacenter","value":"datacenter-1"},{"type":"Folder","value":"group-d2"}]"#,
    );
    mock_property(
        &mut server,
        "Folder/group-d2/childEntity",
        r#"[{"type":"Datacenter","value":"datacenter-2"}]"#,
    );
    mock_property(
        &mut server,
        "Datacenter/datacenter-1/datastore",
        r#"[{"type":"Datastore","value":"datastore-1"},{"type":"Datastore","value":"datastore-2"}]"#,
    );
    // A datastore mounted in both datacenters is reported once
    mock_property(
        &mut server,
        "Datacenter/datacenter-2/datastore",
        r#"[{"type":"Datastore","value":"datastore-1"}]"#,
    );
    mock_property(&mut server, "Datastore/datastore-1/name", r#""ds01""#);
    mock_property(
        &mut server,
        "Datastore/datastore-1/info",
        r#"{"_typeName":"VmfsDatastoreInfo","name":"ds01","vmfs":{"_typeName":"HostVmfsVolume",
            "extent":[{"_typeName":"HostScsiDiskPartition","diskName":"eui.aaaa1111","partition":1}]}}"#,
    );
    mock_property(&mut server, "Datastore/datastore-2/name", r#""nfs01""#);
    mock_property(
        &mut server,
        "Datastore/datastore-2/info",
        r#"{"_typeName":"NasDatastoreInfo","name":"nfs01"}"#,
    );

    let client = connect(&mut server);
    let datastores = client.list_datastores().unwrap();

    assert_eq!(datastores.len(), 2);
    let ds01 = datastores.iter().find(|d| d.id == "datastore-1").unwrap();
    assert_eq!(ds01.name, "ds01");
    assert_eq!(ds01.extents, vec!["eui.aaaa1111".to_string()]);
    let nfs = datastores.iter().find(|d| d.id == "datastore-2").unwrap();
    assert!(nfs.extents.is_empty());
}

#[test]
fn test_vms_on_datastore() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    mock_property(
        &mut server,
        "Datastore/datastore-1/vm",
        r#"[{"type":"VirtualMachine","value":"vm-1"},{"type":"VirtualMachine","value":"vm-2"}]"#,
    );

    let client = connect(&mut server);
    let datastore = Datastore {
        id: "datastore-1".to_string(),
        name: "ds01".to_string(),
        extents: Vec::new(),
    };
    let vms = client.vms_on_datastore(&datastore).unwrap();

    assert_eq!(
        vms,
        vec![MoRef::new("VirtualMachine", "vm-1"), MoRef::new("VirtualMachine", "vm-2")]
    );
}

#[test]
fn test_virtual_machine_collects_rdm_devices() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    mock_property(&mut server, "VirtualMachine/vm-7/name", r#""sql01""#);
    mock_property(
        &mut server,
        "VirtualMachine/vm-7/datastore",
        r#"[{"type":"Datastore","value":"datastore-1"}]"#,
    );
    mock_property(
        &mut server,
        "VirtualMachine/vm-7/config",
        r#"{"_typeName":"VirtualMachineConfigInfo","name":"sql01","hardware":{"device":[
            {"_typeName":"VirtualDisk","key":2000,"backing":{"_typeName":"VirtualDiskFlatVer2BackingInfo","fileName":"[ds01] sql01/sql01.vmdk"}},
            {"_typeName":"VirtualDisk","key":2001,"backing":{"_typeName":"VirtualDiskRawDiskMappingVer1BackingInfo","deviceName":"/vmfs/devices/disks/naa.6000eeee5555"}},
            {"_typeName":"VirtualE1000","key":4000}
        ]}}"#,
    );

    let client = connect(&mut server);
    let vm = client
        .virtual_machine(&MoRef::new("VirtualMachine", "vm-7"))
        .unwrap();

    assert_eq!(vm.id, "vm-7");
    assert_eq!(vm.name, "sql01");
    assert_eq!(vm.datastore_ids, vec!["datastore-1".to_string()]);
    assert_eq!(vm.rdm_devices, vec!["/vmfs/devices/disks/naa.6000eeee5555".to_string()]);
}

#[test]
fn test_snapshot_query() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    mock_property(&mut server, "VirtualMachine/vm-1/snapshot", "null");
    mock_property(
        &mut server,
        "VirtualMachine/vm-2/snapshot",
        r#"{"_typeName":"VirtualMachineSnapshotInfo","rootSnapshotList":[{"name":"before-patch"}]}"#,
    );
    mock_property(&mut server, "VirtualMachine/vm-3/snapshot", "");

    let client = connect(&mut server);

    assert!(!client.has_active_snapshot(&vm("vm-1")).unwrap());
    assert!(client.has_active_snapshot(&vm("vm-2")).unwrap());
    assert!(!client.has_active_snapshot(&vm("vm-3")).unwrap());
}

#[test]
fn test_fault_message_is_surfaced() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    server
        .mock("GET", path("VirtualMachine/vm-1/snapshot").as_str())
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"_typeName":"ManagedObjectNotFound","localizedMessage":"The object 'vim.VirtualMachine:vm-1' has already been deleted"}"#)
        .create();

    let client = connect(&mut server);
    let err = client.has_active_snapshot(&vm("vm-1")).unwrap_err();

    match err {
        SweepError::Api { service, status, message } => {
            assert_eq!(service, "vcenter");
            assert_eq!(status, 500);
            assert!(message.contains("already been deleted"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_disconnect_logs_out() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    let logout = server
        .mock("POST", path("SessionManager/SessionManager/Logout").as_str())
        .match_header("vmware-api-session-id", SESSION)
        .with_status(204)
        .create();

    let client = connect(&mut server);
    client.disconnect().unwrap();

    logout.assert();
}
