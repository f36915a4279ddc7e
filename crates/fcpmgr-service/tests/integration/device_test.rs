//! Integration tests for device usage counters and hypervisor sync.

use fcpmgr_core::error::ErrorKind;
use fcpmgr_entity::fcp::{FcpUsage, StateChange, SyncBatch};

use crate::helpers::{self, TestApp, fcp, fcps};

#[tokio::test]
async fn test_reserve_and_unreserve() {
    let app = TestApp::new().await;
    app.example_p().await;
    let devices = &app.manager.devices;

    devices
        .reserve_devices(&fcps(&["1A01", "1B01"]), "GUEST1", "P")
        .await
        .unwrap();
    let device = app.device("1A01").await;
    assert_eq!(device.reserved, 1);
    assert_eq!(device.assigner_id, "GUEST1");
    assert_eq!(device.tmpl_id, "P");

    devices.unreserve_devices(&fcps(&["1A01"])).await.unwrap();
    let device = app.device("1A01").await;
    assert_eq!(device.reserved, 0);
    assert!(device.tmpl_id.is_empty());
    assert_eq!(app.device("1B01").await.reserved, 1);
}

#[tokio::test]
async fn test_reserve_with_unknown_device_fails_whole_batch() {
    let app = TestApp::new().await;
    app.seed(&[("1A01", "AAAA")]).await;

    let err = app
        .manager
        .devices
        .reserve_devices(&fcps(&["1A01", "FFFF"]), "GUEST1", "P")
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
    assert!(err.message.contains("FFFF"));
    assert_eq!(app.device("1A01").await.reserved, 0);
}

#[tokio::test]
async fn test_connections_never_negative() {
    let app = TestApp::new().await;
    app.seed(&[("1A01", "AAAA")]).await;

    let count = app
        .manager
        .devices
        .decrease_connections(&fcp("1A01"))
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(app.device("1A01").await.connections, 0);
}

#[tokio::test]
async fn test_increase_requires_holder() {
    let app = TestApp::new().await;
    app.example_p().await;
    let devices = &app.manager.devices;

    let err = devices
        .increase_connections(&fcp("1A01"), "GUEST1")
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));

    devices
        .reserve_devices(&fcps(&["1A01"]), "GUEST1", "P")
        .await
        .unwrap();
    assert_eq!(devices.increase_connections(&fcp("1A01"), "GUEST1").await.unwrap(), 1);
    assert_eq!(devices.increase_connections(&fcp("1A01"), "GUEST1").await.unwrap(), 2);
    assert_eq!(devices.connections(&fcp("1A01")).await.unwrap(), 2);
}

#[tokio::test]
async fn test_drained_device_loses_template() {
    let app = TestApp::new().await;
    app.example_p().await;
    let devices = &app.manager.devices;
    let id = fcp("1B01");

    devices.reserve_devices(&[id.clone()], "GUEST1", "P").await.unwrap();
    devices.increase_connections(&id, "GUEST1").await.unwrap();
    devices.unreserve_devices(&[id.clone()]).await.unwrap();

    let usage = devices.usage(&id).await.unwrap();
    assert_eq!(usage.connections, 1);
    assert!(usage.tmpl_id.is_empty());

    devices
        .set_usage(
            &id,
            &FcpUsage {
                assigner_id: "GUEST1".into(),
                reserved: 0,
                connections: 1,
                tmpl_id: "P".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(devices.decrease_connections(&id).await.unwrap(), 0);
    assert!(devices.usage(&id).await.unwrap().tmpl_id.is_empty());
}

#[tokio::test]
async fn test_set_usage_validation() {
    let app = TestApp::new().await;
    app.seed(&[("1A01", "AAAA")]).await;
    let usage = FcpUsage {
        assigner_id: "GUEST1".into(),
        reserved: 1,
        connections: -1,
        tmpl_id: String::new(),
    };

    let err = app
        .manager
        .devices
        .set_usage(&fcp("1A01"), &usage)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::InvalidInput));

    let err = app
        .manager
        .devices
        .set_usage(&fcp("1C01"), &FcpUsage { connections: 0, ..usage })
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_reset_devices_of_assigner() {
    let app = TestApp::new().await;
    app.example_p().await;
    let devices = &app.manager.devices;

    devices
        .reserve_devices(&fcps(&["1A01", "1B01"]), "GUEST1", "P")
        .await
        .unwrap();
    devices.increase_connections(&fcp("1A01"), "GUEST1").await.unwrap();

    assert_eq!(devices.reset_devices_of_assigner("GUEST1").await.unwrap(), 2);
    let device = app.device("1A01").await;
    assert_eq!((device.reserved, device.connections), (0, 0));
    assert!(device.assigner_id.is_empty());
    assert!(device.tmpl_id.is_empty());

    let err = devices.list_devices(Some("GUEST1")).await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_sync_from_hypervisor() {
    let app = TestApp::new().await;
    app.seed(&[("1A01", "AAAA"), ("1A02", "AAAA"), ("1A03", "AAAA")])
        .await;

    let mut refreshed = helpers::free_device("1A01", "cccc");
    refreshed.state = "active".into();
    refreshed.owner = "LINUX01".into();
    let batch = SyncBatch {
        insert: vec![helpers::free_device("1A04", "AAAA")],
        update: vec![refreshed],
        delete: fcps(&["1A02"]),
        state_changes: vec![StateChange {
            ids: fcps(&["1A03"]),
            state: "notfound".into(),
        }],
    };

    let summary = app.manager.devices.sync_from_hypervisor(&batch).await.unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.state_changed, 1);

    let all = app.manager.devices.all_devices().await.unwrap();
    let ids: Vec<&str> = all.iter().map(|d| d.fcp_id.as_str()).collect();
    assert_eq!(ids, vec!["1A01", "1A03", "1A04"]);
    let device = app.device("1A01").await;
    assert_eq!(device.pchid, "CCCC");
    assert_eq!(device.owner, "LINUX01");
    assert_eq!(app.device("1A03").await.state, "notfound");
}

#[tokio::test]
async fn test_failed_sync_leaves_no_partial_state() {
    let app = TestApp::new().await;
    app.seed(&[("1A01", "AAAA"), ("1A02", "AAAA")]).await;

    let batch = SyncBatch {
        insert: vec![
            helpers::free_device("1A05", "AAAA"),
            helpers::free_device("1A01", "AAAA"),
        ],
        delete: fcps(&["1A02"]),
        ..SyncBatch::default()
    };
    let err = app
        .manager
        .devices
        .sync_from_hypervisor(&batch)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Store));

    let all = app.manager.devices.all_devices().await.unwrap();
    let ids: Vec<&str> = all.iter().map(|d| d.fcp_id.as_str()).collect();
    assert_eq!(ids, vec!["1A01", "1A02"]);

    // The store is usable again once the failed batch is rolled back.
    app.manager
        .devices
        .sync_from_hypervisor(&SyncBatch {
            insert: vec![helpers::free_device("1A05", "AAAA")],
            ..SyncBatch::default()
        })
        .await
        .unwrap();
    assert_eq!(app.device("1A05").await.pchid, "AAAA");
}

#[tokio::test]
async fn test_inuse_pchids() {
    let app = TestApp::new().await;
    app.example_p().await;
    app.manager
        .devices
        .reserve_devices(&fcps(&["1A01", "1A02", "1B01"]), "GUEST1", "P")
        .await
        .unwrap();

    let in_use = app.manager.devices.inuse_pchids().await.unwrap();
    assert_eq!(in_use["AAAA"], "1A01 - 1A02");
    assert_eq!(in_use["BBBB"], "1B01");

    let wwpns = app
        .manager
        .devices
        .wwpn_phy_of_pchids(&["aaaa".to_string()])
        .await
        .unwrap();
    assert_eq!(wwpns["AAAA"], vec!["c05076de3300aaaa".to_string()]);
}
