//! Disk create/delete sagas, their compensation and handle release.

mod common;

use bmi_einstein::db::DiskSummary;
use bmi_einstein::Response;
use common::{touched_storage, Harness};

#[test]
fn test_create_disk_clones_and_exposes() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");

    let response = orch.create_disk("disk1", "ubuntu");
    assert_eq!(response, Response::success("4img12".to_string()));

    assert!(h.cluster().has_image("4img12"));
    assert!(h.cluster().is_cloned("4img12"));
    assert!(h.cluster().targets().contains_key("4img12"));
    assert!(h
        .cluster()
        .calls()
        .contains(&"storage.clone 4img7@snapshot 4img12".to_string()));

    let disks = orch.list_disks().into_value().unwrap();
    assert_eq!(
        disks,
        vec![DiskSummary {
            name: "disk1".into(),
            parent: Some("ubuntu".into()),
        }]
    );
    orch.close();
}

#[test]
fn test_delete_disk_removes_everything() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");
    orch.create_disk("disk1", "ubuntu");

    assert_eq!(orch.delete_disk("disk1"), Response::success(true));
    assert!(!h.cluster().has_image("4img12"));
    assert!(h.cluster().targets().is_empty());
    assert!(orch.list_disks().into_value().unwrap().is_empty());

    // Target removal precedes storage removal.
    let calls = h.cluster().calls();
    let target = calls.iter().position(|c| c == "exposure.remove_target 4img12");
    let storage = calls.iter().position(|c| c == "storage.remove 4img12");
    assert!(target.unwrap() < storage.unwrap());
}

#[test]
fn test_duplicate_disk_is_conflict_with_endpoint() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");
    orch.create_disk("disk1", "ubuntu");
    h.cluster().clear_calls();

    let response = orch.create_disk("disk1", "ubuntu");
    assert_eq!(response, Response::failure(409, "Disk exists. Endpoint:4img12"));

    assert!(!touched_storage(&h.cluster().calls()));
    assert_eq!(h.cluster().targets().len(), 1);
    let images = h.cluster().images();
    assert!(images.contains("4img12"));
    assert_eq!(images.len(), 2);
    assert_eq!(orch.list_disks().into_value().unwrap().len(), 1);
}

#[test]
fn test_clone_failure_leaves_no_row() {
    let h = Harness::scenario();
    h.cluster().fail("storage.clone");
    let orch = h.tenant("tenantA");

    let response = orch.create_disk("disk1", "ubuntu");
    assert_eq!(response.status_code(), 500);

    assert!(orch.list_disks().into_value().unwrap().is_empty());
    assert!(h.cluster().targets().is_empty());
}

#[test]
fn test_exposure_failure_removes_clone_and_row() {
    let h = Harness::scenario();
    h.cluster().fail("exposure.add_target");
    let orch = h.tenant("tenantA");

    let response = orch.create_disk("disk1", "ubuntu");
    assert_eq!(response.status_code(), 500);

    assert!(!h.cluster().has_image("4img12"));
    assert!(h
        .cluster()
        .calls()
        .contains(&"storage.remove 4img12".to_string()));
    assert!(orch.list_disks().into_value().unwrap().is_empty());

    // The name is free again.
    h.cluster().heal("exposure.add_target");
    assert!(orch.create_disk("disk1", "ubuntu").is_success());
}

#[test]
fn test_missing_source_image() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");

    let response = orch.create_disk("disk1", "centos");
    assert_eq!(response, Response::failure(404, "Image centos does not exist"));
    assert!(!touched_storage(&h.cluster().calls()));
}

#[test]
fn test_images_are_scoped_to_project() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantB");

    let response = orch.create_disk("disk1", "ubuntu");
    assert_eq!(response.status_code(), 404);
}

#[test]
fn test_failed_storage_removal_restores_target() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");
    orch.create_disk("disk1", "ubuntu");
    h.cluster().fail("storage.remove");

    let response = orch.delete_disk("disk1");
    assert_eq!(response, Response::failure(500, "disk1 failed: injected fault"));

    assert!(h.cluster().targets().contains_key("4img12"));
    assert!(h.cluster().has_image("4img12"));
    assert_eq!(orch.list_disks().into_value().unwrap().len(), 1);
}

#[test]
fn test_failed_target_removal_stops_delete() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");
    orch.create_disk("disk1", "ubuntu");
    h.cluster().fail("exposure.remove_target");
    h.cluster().clear_calls();

    assert_eq!(orch.delete_disk("disk1").status_code(), 500);
    assert!(!touched_storage(&h.cluster().calls()));
    assert_eq!(orch.list_disks().into_value().unwrap().len(), 1);
}

#[test]
fn test_delete_missing_disk() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");
    assert_eq!(
        orch.delete_disk("disk9"),
        Response::failure(404, "Image disk9 does not exist")
    );
}

#[test]
fn test_backends_released_on_every_exit() {
    let h = Harness::scenario();

    let orch = h.tenant("tenantA");
    orch.create_disk("disk1", "ubuntu");
    orch.close();

    {
        let orch = h.tenant("tenantA");
        orch.delete_disk("disk9");
    }

    let result = bmi_einstein::Orchestrator::with_identity(
        &h.deployment,
        &h.policy,
        h.settings.clone(),
        bmi_einstein::authz::Identity::new("alice", "secret", "nobody"),
    );
    assert!(matches!(result, Err(bmi_einstein::BmiError::ProjectNotFound(_))));

    assert_eq!(h.cluster().acquires(), 3);
    assert_eq!(h.cluster().releases(), 3);
}
