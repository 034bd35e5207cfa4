#![allow(clippy::unwrap_used)]
// Device discovery and authorization against the scripted host.

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;

use revtether_core::{AuthorizationState, CoreError, Device, DeviceSessionManager};

use common::{FakeHost, HostState, pixel};

fn manager(host: &std::sync::Arc<FakeHost>) -> DeviceSessionManager {
    DeviceSessionManager::new(
        host.capabilities().executor,
        Duration::from_secs(5),
        Some(Duration::from_secs(60)),
    )
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_zero_devices_is_no_device() {
    let host = FakeHost::new(HostState {
        devices: Vec::new(),
        ..HostState::default()
    });
    assert!(matches!(
        manager(&host).discover_device().await,
        Err(CoreError::NoDevice)
    ));
}

#[tokio::test]
async fn test_one_device_is_described() {
    let host = FakeHost::new(HostState::default());
    let device = manager(&host).discover_device().await.unwrap();
    assert_eq!(device.id, "R58M123ABC");
    assert_eq!(device.model.as_deref(), Some("Pixel 7"));
}

#[tokio::test]
async fn test_many_devices_are_never_auto_selected() {
    let host = FakeHost::new(HostState {
        devices: vec![
            pixel(),
            Device::new("emulator-5554", AuthorizationState::Authorized),
            Device::new("0A1B2C", AuthorizationState::Unauthorized),
        ],
        ..HostState::default()
    });
    match manager(&host).discover_device().await {
        Err(CoreError::AmbiguousDevice { ids }) => {
            assert_eq!(ids, ["R58M123ABC", "emulator-5554", "0A1B2C"]);
        }
        other => panic!("expected AmbiguousDevice, got {other:?}"),
    }
}

// ── Listing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_listing_skips_properties_of_unauthorized_devices() {
    let host = FakeHost::new(HostState {
        devices: vec![
            pixel(),
            Device::new("0A1B2C", AuthorizationState::Unauthorized),
        ],
        ..HostState::default()
    });
    let devices = manager(&host).list_described().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].model.as_deref(), Some("Pixel 7"));
    assert_eq!(devices[0].version.as_deref(), Some("14"));
    assert_eq!(devices[1].model, None);
    assert!(!devices[1].is_authorized());
}

// ── Authorization ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_authorization_gets_one_grace_retry() {
    let host = FakeHost::new(HostState {
        echo_failures: 1,
        ..HostState::default()
    });
    assert!(manager(&host).verify_authorization(&pixel()).await.unwrap());

    let host = FakeHost::new(HostState {
        echo_failures: 2,
        ..HostState::default()
    });
    assert!(!manager(&host).verify_authorization(&pixel()).await.unwrap());
}
