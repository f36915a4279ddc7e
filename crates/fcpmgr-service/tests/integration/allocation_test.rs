//! Integration tests for device selection and allocation.

use fcpmgr_core::config::AllocatorConfig;
use fcpmgr_core::error::ErrorKind;
use fcpmgr_core::types::{CapacitySnapshot, SelectionPolicy};
use fcpmgr_entity::fcp::FcpUsage;
use fcpmgr_service::allocation::AllocateRequest;
use fcpmgr_service::template::CreateTemplateRequest;

use crate::helpers::{TestApp, example_capacity, fcp, fcps};

fn request(assigner: &str, capacity: CapacitySnapshot) -> AllocateRequest {
    AllocateRequest {
        assigner_id: assigner.to_string(),
        template_id: Some("P".into()),
        capacity,
        ..AllocateRequest::default()
    }
}

#[tokio::test]
async fn test_weighted_selection_example() {
    let app = TestApp::new().await;
    app.example_p().await;

    for _ in 0..10 {
        let selection = app
            .manager
            .allocation
            .select_devices("P", &example_capacity(0), Some(SelectionPolicy::Weighted))
            .await
            .unwrap();
        assert!(selection.reason.is_none());
        assert_eq!(selection.devices.len(), 2);
        assert!(["1A01", "1A02"].contains(&selection.devices[0].fcp_id.as_str()));
        assert_eq!(selection.devices[1].fcp_id, fcp("1B01"));
    }
}

#[tokio::test]
async fn test_exhausted_pchid_yields_diagnostic() {
    let app = TestApp::new().await;
    app.example_p().await;

    let selection = app
        .manager
        .allocation
        .select_devices("P", &example_capacity(1), None)
        .await
        .unwrap();
    assert!(selection.is_empty());
    let reason = selection.reason.unwrap_or_default();
    assert!(reason.contains("BBBB"), "unexpected reason: {reason}");
}

#[tokio::test]
async fn test_unknown_pchid_has_no_capacity() {
    let app = TestApp::new().await;
    app.example_p().await;
    let capacity = CapacitySnapshot::new().with("AAAA", 0, 2);

    let selection = app
        .manager
        .allocation
        .select_devices("P", &capacity, None)
        .await
        .unwrap();
    assert!(selection.is_empty());
    assert!(selection.reason.unwrap_or_default().contains("BBBB"));
}

#[tokio::test]
async fn test_same_index_policy_from_config() {
    let app = TestApp::with_allocator(AllocatorConfig {
        same_index_policy: true,
        ..AllocatorConfig::default()
    })
    .await;
    app.example_p().await;
    assert_eq!(app.manager.allocation.default_policy(), SelectionPolicy::SameIndex);

    let selection = app
        .manager
        .allocation
        .select_devices("P", &example_capacity(0), None)
        .await
        .unwrap();
    assert_eq!(selection.fcp_ids(), fcps(&["1A01", "1B01"]));
}

#[tokio::test]
async fn test_selection_skips_unavailable_devices() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.manager
        .devices
        .set_usage(
            &fcp("1A01"),
            &FcpUsage {
                assigner_id: "GUEST9".into(),
                reserved: 0,
                connections: 1,
                tmpl_id: String::new(),
            },
        )
        .await
        .unwrap();

    for _ in 0..5 {
        let selection = app
            .manager
            .allocation
            .select_devices("P", &example_capacity(0), None)
            .await
            .unwrap();
        assert_eq!(selection.fcp_ids(), fcps(&["1A02", "1B01"]));
    }
}

#[tokio::test]
async fn test_allocate_reserves_and_is_idempotent() {
    let app = TestApp::new().await;
    app.example_p().await;
    let allocation = &app.manager.allocation;

    let first = allocation
        .allocate(&request("GUEST1", example_capacity(0)))
        .await
        .unwrap();
    assert!(first.is_reserved_changed);
    assert_eq!(first.template_id, "P");
    assert_eq!(first.path_count, 2);
    assert_eq!(first.devices.len(), 2);
    assert_eq!(first.pchid_devices["BBBB"], fcps(&["1B01"]));

    for device in &first.devices {
        let row = app.device(device.fcp_id.as_str()).await;
        assert_eq!(row.reserved, 1);
        assert_eq!(row.assigner_id, "GUEST1");
        assert_eq!(row.tmpl_id, "P");
    }

    let again = allocation
        .allocate(&request("GUEST1", example_capacity(1)))
        .await
        .unwrap();
    assert!(!again.is_reserved_changed);
    assert_eq!(again.devices, first.devices);
}

#[tokio::test]
async fn test_concurrent_allocations_never_share_devices() {
    let app = TestApp::new().await;
    app.seed(&[("1A01", "AAAA"), ("1B01", "BBBB")]).await;
    app.create_template("P", "1A01;1B01", None).await;
    let capacity = CapacitySnapshot::new()
        .with("AAAA", 0, 8)
        .with("BBBB", 0, 8);
    let allocation = &app.manager.allocation;

    let request1 = request("GUEST1", capacity.clone());
    let request2 = request("GUEST2", capacity.clone());
    let (first, second) = tokio::join!(
        allocation.allocate(&request1),
        allocation.allocate(&request2),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let winners: Vec<_> = [&first, &second]
        .into_iter()
        .filter(|o| o.is_reserved_changed)
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].devices.len(), 2);

    let loser = if first.is_reserved_changed { &second } else { &first };
    assert!(loser.devices.is_empty());
    assert!(loser.reason.is_some());

    let holders: Vec<String> = [app.device("1A01").await, app.device("1B01").await]
        .into_iter()
        .map(|d| d.assigner_id)
        .collect();
    assert_eq!(holders[0], holders[1]);
}

#[tokio::test]
async fn test_allocate_without_capacity_reports_reason() {
    let app = TestApp::new().await;
    app.example_p().await;

    let outcome = app
        .manager
        .allocation
        .allocate(&request("GUEST1", example_capacity(1)))
        .await
        .unwrap();
    assert!(outcome.devices.is_empty());
    assert!(!outcome.is_reserved_changed);
    assert!(outcome.reason.is_some());
    assert_eq!(app.device("1B01").await.reserved, 0);
}

#[tokio::test]
async fn test_allocate_resolves_template() {
    let app = TestApp::new().await;
    app.seed(&[("1A01", "AAAA"), ("1B01", "BBBB"), ("1C01", "AAAA"), ("1D01", "BBBB")])
        .await;
    let templates = &app.manager.templates;
    templates
        .create(CreateTemplateRequest {
            id: Some("HOST".into()),
            name: "HOST".into(),
            devices: fcpmgr_service::template::DeviceList::Text("1A01;1B01".into()),
            host_default: true,
            ..CreateTemplateRequest::default()
        })
        .await
        .unwrap();
    templates
        .create(CreateTemplateRequest {
            id: Some("SPT".into()),
            name: "SPT".into(),
            devices: fcpmgr_service::template::DeviceList::Text("1C01;1D01".into()),
            default_sp_list: vec!["SP1".into()],
            ..CreateTemplateRequest::default()
        })
        .await
        .unwrap();
    let capacity = CapacitySnapshot::uniform(["AAAA", "BBBB"], 4);

    let by_sp = app
        .manager
        .allocation
        .allocate(&AllocateRequest {
            assigner_id: "GUEST1".into(),
            sp_name: Some("SP1".into()),
            capacity: capacity.clone(),
            ..AllocateRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(by_sp.template_id, "SPT");
    assert_eq!(by_sp.devices.len(), 2);

    let by_host = app
        .manager
        .allocation
        .allocate(&AllocateRequest {
            assigner_id: "GUEST2".into(),
            sp_name: Some("UNBOUND".into()),
            capacity,
            ..AllocateRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(by_host.template_id, "HOST");
    assert_eq!(by_host.pchid_devices.len(), 2);
}

#[tokio::test]
async fn test_allocate_without_any_template() {
    let app = TestApp::new().await;
    let err = app
        .manager
        .allocation
        .allocate(&AllocateRequest {
            assigner_id: "GUEST1".into(),
            ..AllocateRequest::default()
        })
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_release_keeps_connected_devices() {
    let app = TestApp::new().await;
    app.example_p().await;
    let outcome = app
        .manager
        .allocation
        .allocate(&request("GUEST1", example_capacity(0)))
        .await
        .unwrap();
    let path0 = outcome.devices[0].fcp_id.clone();
    app.manager
        .devices
        .increase_connections(&fcp("1B01"), "GUEST1")
        .await
        .unwrap();

    let released = app.manager.allocation.release("GUEST1", "P").await.unwrap();
    assert_eq!(released, vec![path0.clone()]);
    assert_eq!(app.device(path0.as_str()).await.reserved, 0);
    assert_eq!(app.device("1B01").await.reserved, 1);

    let err = app.manager.templates.delete("P").await.unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
}
