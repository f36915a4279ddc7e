//! Integration tests for multipath template management.

use std::collections::{BTreeMap, BTreeSet};

use fcpmgr_core::error::ErrorKind;
use fcpmgr_core::types::FcpId;
use fcpmgr_entity::fcp::FcpUsage;
use fcpmgr_entity::template::TemplateFilter;
use fcpmgr_service::template::{CreateTemplateRequest, DeviceList, EditTemplateRequest};

use crate::helpers::{TestApp, fcp, fcps};

fn edit_devices(devices: &str) -> EditTemplateRequest {
    EditTemplateRequest {
        devices: Some(DeviceList::Text(devices.to_string())),
        ..EditTemplateRequest::default()
    }
}

#[tokio::test]
async fn test_create_template() {
    let app = TestApp::new().await;
    let info = app.example_p().await;

    assert_eq!(info.id, "P");
    assert_eq!(info.path_count, 2);
    assert_eq!(info.min_fcp_paths_count, 2);
    assert!(!info.host_default);

    let err = app
        .manager
        .templates
        .create(CreateTemplateRequest {
            id: Some("P".into()),
            name: "again".into(),
            ..CreateTemplateRequest::default()
        })
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::AlreadyExists));
}

#[tokio::test]
async fn test_create_generates_id_and_resolves_min_paths() {
    let app = TestApp::new().await;
    let mut paths = BTreeMap::new();
    paths.insert(0, BTreeSet::from([fcp("1A01")]));
    paths.insert(1, BTreeSet::from([fcp("1B01")]));
    paths.insert(2, BTreeSet::from([fcp("1C01")]));

    let info = app
        .manager
        .templates
        .create(CreateTemplateRequest {
            name: "three paths".into(),
            devices: DeviceList::Paths(paths),
            default_sp_list: vec!["SP1".into()],
            ..CreateTemplateRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(info.id.len(), 36);
    assert_eq!(info.path_count, 3);
    assert_eq!(info.min_fcp_paths_count, 3);
    assert_eq!(info.storage_providers, vec!["SP1".to_string()]);
}

#[tokio::test]
async fn test_create_rejects_bad_min_paths() {
    let app = TestApp::new().await;
    let templates = &app.manager.templates;
    let request = |min| CreateTemplateRequest {
        id: Some("T".into()),
        name: "T".into(),
        devices: DeviceList::Text("1A01;1B01".into()),
        min_fcp_paths_count: Some(min),
        ..CreateTemplateRequest::default()
    };

    let err = templates.create(request(3)).await.unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
    let err = templates.create(request(0)).await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidInput));
    assert!(templates.create(request(1)).await.is_ok());
}

#[tokio::test]
async fn test_host_default_is_exclusive() {
    let app = TestApp::new().await;
    let templates = &app.manager.templates;
    for id in ["T", "U"] {
        templates
            .create(CreateTemplateRequest {
                id: Some(id.into()),
                name: id.into(),
                host_default: true,
                ..CreateTemplateRequest::default()
            })
            .await
            .unwrap();
    }

    let defaults = templates
        .list(&TemplateFilter::HostDefault(true))
        .await
        .unwrap();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, "U");
    assert_eq!(templates.host_default().await.unwrap().unwrap().id, "U");
    assert!(!templates.get("T").await.unwrap().host_default);
}

#[tokio::test]
async fn test_delete_blocked_while_allocated() {
    let app = TestApp::new().await;
    app.example_p().await;
    let devices = &app.manager.devices;
    let templates = &app.manager.templates;

    devices
        .reserve_devices(&fcps(&["1A01", "1B01"]), "GUEST1", "P")
        .await
        .unwrap();
    devices.increase_connections(&fcp("1B01"), "GUEST1").await.unwrap();

    let err = templates.delete("P").await.unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
    assert!(err.message.contains("1A01"));

    devices.unreserve_devices(&fcps(&["1A01", "1B01"])).await.unwrap();
    devices.decrease_connections(&fcp("1B01")).await.unwrap();
    templates.delete("P").await.unwrap();

    let err = templates.get("P").await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
    let err = templates.delete("P").await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_edit_dropping_connected_path_conflicts() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.manager
        .devices
        .set_usage(
            &fcp("1B01"),
            &FcpUsage {
                assigner_id: "GUEST1".into(),
                reserved: 0,
                connections: 3,
                tmpl_id: "P".into(),
            },
        )
        .await
        .unwrap();

    let err = app
        .manager
        .templates
        .edit("P", edit_devices("1A01-1A02"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
    assert!(err.message.contains("1B01"));
    assert_eq!(app.manager.templates.path_count("P").await.unwrap(), 2);
}

#[tokio::test]
async fn test_edit_drops_device_in_use_elsewhere() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.seed(&[("1A03", "CCCC")]).await;
    app.manager
        .devices
        .reserve_devices(&fcps(&["1A02"]), "GUEST2", "OTHER")
        .await
        .unwrap();

    let outcome = app
        .manager
        .templates
        .edit("P", edit_devices("1A01,1A03;1B01"))
        .await
        .unwrap();

    assert_eq!(outcome.template.path_count, 2);
    assert_eq!(outcome.pchids.add.all, vec!["CCCC".to_string()]);
    assert_eq!(outcome.pchids.add.first_used_by_templates, vec!["CCCC".to_string()]);
    assert!(outcome.pchids.delete.all.is_empty());
    assert_eq!(outcome.pchids.all, vec!["AAAA", "BBBB", "CCCC"]);
}

#[tokio::test]
async fn test_edit_rejects_dropping_reserved_device() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.manager
        .devices
        .reserve_devices(&fcps(&["1A02"]), "GUEST1", "P")
        .await
        .unwrap();

    let err = app
        .manager
        .templates
        .edit("P", edit_devices("1A01;1B01"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
    assert!(err.message.contains("1A02"));
}

#[tokio::test]
async fn test_edit_min_paths_and_providers() {
    let app = TestApp::new().await;
    app.example_p().await;
    let templates = &app.manager.templates;

    let err = templates
        .edit(
            "P",
            EditTemplateRequest {
                min_fcp_paths_count: Some(3),
                ..EditTemplateRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Conflict));

    let outcome = templates
        .edit(
            "P",
            EditTemplateRequest {
                name: Some("renamed".into()),
                description: Some(String::new()),
                default_sp_list: Some(vec!["SP1".into(), "SP2".into()]),
                min_fcp_paths_count: Some(1),
                ..EditTemplateRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.template.name, "renamed");
    assert_eq!(outcome.template.min_fcp_paths_count, 1);
    assert_eq!(outcome.template.storage_providers.len(), 2);

    let bound = templates
        .list(&TemplateFilter::StorageProviders(vec!["all".into()]))
        .await
        .unwrap();
    assert_eq!(bound.len(), 1);
    assert_eq!(templates.min_paths_count("P").await.unwrap(), 1);
}

#[tokio::test]
async fn test_details_statistics() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.manager
        .devices
        .reserve_devices(&fcps(&["1A01"]), "GUEST1", "P")
        .await
        .unwrap();

    let details = app
        .manager
        .templates
        .details(Some(&["P".to_string()]))
        .await
        .unwrap();
    assert_eq!(details.len(), 1);
    let path0 = &details[0].statistics[&0];
    assert_eq!(path0.total, "1A01 - 1A02");
    assert_eq!(path0.available, "1A02");
    assert_eq!(path0.reserve_only, "1A01");
    assert_eq!(details[0].raw[&1].len(), 1);

    let err = app
        .manager
        .templates
        .details(Some(&["NOPE".to_string()]))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_remove_unused_devices_keeps_in_use() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.manager
        .devices
        .reserve_devices(&fcps(&["1A01"]), "GUEST1", "P")
        .await
        .unwrap();

    let removed: Vec<FcpId> = app
        .manager
        .templates
        .remove_unused_devices("P", &fcps(&["1A01", "1A02"]))
        .await
        .unwrap();
    assert_eq!(removed, fcps(&["1A02"]));
    assert_eq!(
        app.manager.templates.pchids_of_template("P").await.unwrap(),
        vec!["AAAA", "BBBB"]
    );
}

#[tokio::test]
async fn test_rename_after_path_emptied_keeps_min_paths() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.manager
        .templates
        .remove_unused_devices("P", &fcps(&["1B01"]))
        .await
        .unwrap();
    assert_eq!(app.manager.templates.path_count("P").await.unwrap(), 1);

    let outcome = app
        .manager
        .templates
        .edit(
            "P",
            EditTemplateRequest {
                name: Some("renamed".into()),
                host_default: Some(true),
                ..EditTemplateRequest::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.template.name, "renamed");
    assert!(outcome.template.host_default);
    assert_eq!(outcome.template.min_fcp_paths_count, 2);

    let err = app
        .manager
        .templates
        .edit(
            "P",
            EditTemplateRequest {
                min_fcp_paths_count: Some(2),
                ..EditTemplateRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
}

#[tokio::test]
async fn test_list_by_assigner() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.create_template("Q", "1A01;1B01", None).await;
    app.manager
        .devices
        .reserve_devices(&fcps(&["1A01"]), "GUEST1", "Q")
        .await
        .unwrap();

    let templates = app
        .manager
        .templates
        .list(&TemplateFilter::Assigner("GUEST1".into()))
        .await
        .unwrap();
    let ids: Vec<&str> = templates.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["Q"]);
    assert_eq!(
        app.manager.templates.pchids_of_all_templates().await.unwrap(),
        vec!["AAAA", "BBBB"]
    );
}
