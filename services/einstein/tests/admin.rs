//! Admin-only maintenance: projects, image rows, targets.

mod common;

use bmi_einstein::db::MetadataStore;
use bmi_einstein::iscsi::TargetInfo;
use bmi_einstein::orchestrator::ImageSpec;
use bmi_einstein::{Orchestrator, Response};
use bmi_id::{ImageId, ProjectId};
use common::Harness;

#[test]
fn test_admin_operations_reject_tenants_without_side_effects() {
    let h = Harness::scenario();
    let orch = h.tenant("tenantA");
    h.cluster().clear_calls();

    let denied = Response::<bool>::failure(403, "Authorization failed");
    assert_eq!(orch.add_project("tenantC", None), denied);
    assert_eq!(orch.delete_project("tenantB"), denied);
    assert_eq!(orch.mount_image("ubuntu"), denied);
    assert_eq!(orch.umount_image("ubuntu"), denied);
    assert_eq!(orch.delete_image("tenantA", "ubuntu"), denied);
    assert_eq!(
        orch.add_image(&ImageSpec {
            project: "tenantA".into(),
            name: "centos".into(),
            ..ImageSpec::default()
        }),
        denied
    );
    assert_eq!(orch.list_projects().status_code(), 403);
    assert_eq!(orch.show_mounted().status_code(), 403);

    assert!(h.cluster().calls().is_empty());
    assert!(h.cluster().targets().is_empty());
    assert!(h.store().find_project_id("tenantC").unwrap().is_none());
    assert!(h.store().find_project_id("tenantB").unwrap().is_some());
}

#[test]
fn test_project_crud() {
    let h = Harness::new();
    let orch = h.admin("bmi_admin");

    assert_eq!(orch.add_project("tenantC", Some(ProjectId::new(40))), Response::success(true));
    assert_eq!(
        orch.add_project("tenantC", None),
        Response::failure(409, "Project tenantC already exists")
    );

    let projects = orch.list_projects().into_value().unwrap();
    let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["bmi_admin", "tenantA", "tenantB", "tenantC"]);
    assert_eq!(projects[3].id, ProjectId::new(40));

    assert_eq!(orch.delete_project("tenantC"), Response::success(true));
    assert_eq!(
        orch.delete_project("tenantC"),
        Response::failure(404, "Project tenantC does not exist")
    );
}

#[test]
fn test_project_with_images_cannot_be_deleted() {
    let h = Harness::scenario();
    let orch = h.admin("bmi_admin");

    assert_eq!(
        orch.delete_project("tenantA"),
        Response::failure(409, "Project tenantA still owns images")
    );
}

#[test]
fn test_add_and_delete_image_rows() {
    let h = Harness::scenario();
    let orch = h.admin("bmi_admin");
    h.cluster().clear_calls();

    let spec = ImageSpec {
        project: "tenantB".into(),
        name: "ubuntu-snap".into(),
        id: Some(ImageId::new(30)),
        is_snapshot: true,
        parent: None,
        public: true,
    };
    assert_eq!(orch.add_image(&spec), Response::success(true));

    let row = h
        .store()
        .find_image("ubuntu-snap", h.project_id("tenantB"))
        .unwrap()
        .unwrap();
    assert_eq!(row.id, ImageId::new(30));
    assert!(row.is_snapshot);
    assert!(row.public);

    assert_eq!(
        orch.add_image(&spec),
        Response::failure(409, "Image ubuntu-snap already exists")
    );

    let orphan = ImageSpec {
        project: "tenantB".into(),
        name: "child".into(),
        parent: Some("missing".into()),
        ..ImageSpec::default()
    };
    assert_eq!(
        orch.add_image(&orphan),
        Response::failure(404, "Image missing does not exist")
    );

    assert_eq!(orch.delete_image("tenantB", "ubuntu-snap"), Response::success(true));
    assert_eq!(
        orch.delete_image("tenantB", "ubuntu-snap"),
        Response::failure(404, "Image ubuntu-snap does not exist")
    );

    // Metadata only.
    assert!(h.cluster().calls().is_empty());
}

#[test]
fn test_add_image_with_parent() {
    let h = Harness::scenario();
    let orch = h.admin("bmi_admin");

    let spec = ImageSpec {
        project: "tenantA".into(),
        name: "ubuntu-disk".into(),
        parent: Some("ubuntu".into()),
        ..ImageSpec::default()
    };
    assert!(orch.add_image(&spec).is_success());

    let disks = h.tenant("tenantA").list_disks().into_value().unwrap();
    assert_eq!(disks.len(), 1);
    assert_eq!(disks[0].parent.as_deref(), Some("ubuntu"));
}

#[test]
fn test_mount_and_umount() {
    let h = Harness::scenario();
    let orch = h.admin("tenantA");

    assert_eq!(orch.mount_image("ubuntu"), Response::success(true));
    assert!(h.cluster().targets().contains_key("4img7"));
    assert_eq!(
        orch.mount_image("ubuntu"),
        Response::failure(409, "iSCSI target 4img7 already exists")
    );

    assert_eq!(orch.umount_image("ubuntu"), Response::success(true));
    assert!(h.cluster().targets().is_empty());
    assert_eq!(
        orch.umount_image("ubuntu"),
        Response::failure(404, "iSCSI target 4img7 does not exist")
    );
    assert_eq!(
        orch.mount_image("centos"),
        Response::failure(404, "Image centos does not exist")
    );
}

#[test]
fn test_show_mounted_is_scoped_to_caller_project() {
    let h = Harness::scenario();
    h.tenant("tenantA").create_disk("disk1", "ubuntu");

    h.seed_golden("tenantB", "debian", 20);
    let tenant_b = h.tenant("tenantB");
    tenant_b.create_disk("disk2", "debian");

    // Created outside BMI.
    h.cluster().add_target("legacy-target");
    // Same image id under another deployment's uid.
    h.cluster().add_target("9img12");
    h.cluster().add_target("img12");

    let mounted_a = h.admin("tenantA").show_mounted().into_value().unwrap();
    assert_eq!(mounted_a.keys().collect::<Vec<_>>(), vec!["disk1"]);
    assert_eq!(
        mounted_a["disk1"].backing_store.as_deref(),
        Some("bmi/4img12")
    );

    let mounted_b = h.admin("tenantB").show_mounted().into_value().unwrap();
    assert_eq!(mounted_b.keys().collect::<Vec<_>>(), vec!["disk2"]);

    assert!(h.admin("bmi_admin").show_mounted().into_value().unwrap().is_empty());
}

#[test]
fn test_show_mounted_entry_shape() {
    let h = Harness::scenario();
    let orch = h.admin("tenantA");
    orch.mount_image("ubuntu");

    let mounted = orch.show_mounted().into_value().unwrap();
    assert!(matches!(
        mounted.get("ubuntu"),
        Some(TargetInfo { tid: Some(_), backing_store: Some(store) }) if store == "bmi/4img7"
    ));
}

#[test]
fn test_remake_mappings_persists_targets() {
    let h = Harness::new();
    let orch = Orchestrator::bootstrap(&h.deployment, &h.policy, h.settings.clone()).unwrap();

    orch.remake_mappings();
    assert_eq!(h.cluster().persist_count(), 1);

    // Failures are logged, not raised.
    h.cluster().fail("exposure.persist_targets");
    orch.remake_mappings();
    assert_eq!(h.cluster().persist_count(), 1);

    orch.close();
    assert_eq!(h.cluster().releases(), 1);
}

#[test]
fn test_bootstrap_requires_admin_project() {
    let h = Harness::new();
    let settings = bmi_einstein::Settings {
        admin_project: "ops".into(),
        ..h.settings.clone()
    };

    let result = Orchestrator::bootstrap(&h.deployment, &h.policy, settings);
    assert!(matches!(result, Err(bmi_einstein::BmiError::ProjectNotFound(p)) if p == "ops"));
    assert_eq!(h.cluster().acquires(), h.cluster().releases());
}

#[test]
fn test_admin_project_policy_grants_admin_to_its_members() {
    let h = Harness::new();
    let policy = bmi_einstein::authz::AdminProject::new("bmi_admin");
    let open = |project: &str| {
        Orchestrator::with_identity(
            &h.deployment,
            &policy,
            h.settings.clone(),
            bmi_einstein::authz::Identity::new("bob", "pw", project),
        )
        .unwrap()
    };

    assert!(open("bmi_admin").is_admin());
    assert!(!open("tenantA").is_admin());
    assert!(open("bmi_admin").list_projects().is_success());
}
