//! Integration tests for the waypost relay
//!
//! These tests drive the public API end-to-end against the scripted mock
//! transport: notification events in, wire frames out.

use std::time::Duration;

use waypost_relay::test_utils::{FixedPower, MockTransport, WriteLog};
use waypost_relay::{
    ConnectivitySignal, LinkState, LinkStateMachine, NotificationEvent, PeripheralConfig,
    ReconnectConfig, RelayConfigBuilder, RelayController, RelayService,
};

const NAV_APP: &str = "com.google.android.apps.maps";
const TS: i64 = 1_700_000_000_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn nav_event(title: &str, body: &str) -> NotificationEvent {
    NotificationEvent {
        app_id: NAV_APP.to_string(),
        notification_id: 42,
        title: title.to_string(),
        body: body.to_string(),
        icon: None,
        is_dismissal: false,
        timestamp_millis: TS,
    }
}

fn controller(
    transport: MockTransport,
) -> (RelayController<MockTransport, FixedPower>, WriteLog) {
    init_tracing();
    let log = transport.log();
    let config = RelayConfigBuilder::new()
        .peripheral_address("24:0A:C4:13:58:EA".parse().unwrap())
        .auto_reconnect(false)
        .build();
    let (controller, _status) = RelayController::new(config, transport, FixedPower(90));
    (controller, log)
}

#[tokio::test]
async fn test_cue_relayed_as_five_ordered_frames() {
    let (mut relay, log) = controller(MockTransport::new());
    relay.start().await.unwrap();

    relay
        .on_cue(nav_event(
            "500 m - Main Street",
            "12 min \u{b7} 3.4 km \u{b7} 14:32",
        ))
        .await
        .unwrap();

    let frames = log.message_frames();
    assert_eq!(frames.len(), 5);
    assert_eq!(&frames[0][..], b"\x0112 min");
    assert_eq!(&frames[1][..], b"\x023.4km");
    assert_eq!(&frames[2][..], b"\x0314:32");
    assert_eq!(&frames[3][..], b"\x04Main Street");
    assert_eq!(&frames[4][..], b"\x05Unknown");
}

#[tokio::test]
async fn test_title_sanitation_reaches_the_wire() {
    let (mut relay, log) = controller(MockTransport::new());
    relay.start().await.unwrap();

    // En-dash separator, accented destination, arrival prefix
    relay
        .on_cue(nav_event(
            "5 min \u{2013} City Caf\u{e9}",
            "5 min \u{b7} 1.2 km \u{b7} Prihod: 09:15",
        ))
        .await
        .unwrap();

    let frames = log.message_frames();
    assert_eq!(&frames[2][1..], b"09:15");
    assert_eq!(&frames[3][1..], b"City Caf");
}

#[tokio::test]
async fn test_unchanged_cue_not_retransmitted() {
    let (mut relay, log) = controller(MockTransport::new());
    relay.start().await.unwrap();
    let event = nav_event("500 m - Main Street", "2 min \u{b7} 500 m \u{b7} 14:32");

    for _ in 0..3 {
        relay.on_cue(event.clone()).await.unwrap();
    }

    assert_eq!(log.message_frames().len(), 5);
    assert_eq!(relay.stats().transmissions, 1);
    assert_eq!(relay.stats().duplicates_skipped, 2);
}

#[tokio::test]
async fn test_dismissal_resets_dedup_and_writes_status() {
    let (mut relay, log) = controller(MockTransport::new());
    relay.start().await.unwrap();
    let event = nav_event("500 m - Main Street", "2 min \u{b7} 500 m \u{b7} 14:32");

    relay.on_cue(event.clone()).await.unwrap();
    let dismissal = NotificationEvent {
        is_dismissal: true,
        ..event.clone()
    };
    relay.on_cue(dismissal).await.unwrap();

    let status = log.status_frames();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0][0], 90);

    // Same cue again goes out in full after the trip ended
    relay.on_cue(event).await.unwrap();
    assert_eq!(relay.stats().transmissions, 2);
}

#[tokio::test]
async fn test_failed_transmission_retried_in_full() {
    let (mut relay, log) = controller(MockTransport::new().fail_write_at(3));
    relay.start().await.unwrap();
    let event = nav_event("500 m - Main Street", "2 min \u{b7} 500 m \u{b7} 14:32");

    assert!(relay.on_cue(event.clone()).await.is_err());
    assert_eq!(log.message_frames().len(), 3);
    log.clear();

    // The failed cue was never marked sent; a retry sends all five fields
    relay.on_connectivity(ConnectivitySignal::RadioEnabled).await;
    relay.on_cue(event).await.unwrap();
    assert_eq!(log.message_frames().len(), 5);
}

#[tokio::test]
async fn test_unsupported_peripheral_is_fatal_for_the_attempt() {
    let (mut relay, _log) = controller(MockTransport::new().missing_channels());
    let err = relay.start().await.unwrap_err();
    assert!(!err.is_retriable());
    assert_eq!(relay.link().state(), LinkState::ErrorBackoff);
}

#[tokio::test]
async fn test_heartbeat_does_not_disturb_dedup() {
    let (mut relay, log) = controller(MockTransport::new());
    relay.start().await.unwrap();
    let event = nav_event("500 m - Main Street", "2 min \u{b7} 500 m \u{b7} 14:32");

    relay.on_cue(event.clone()).await.unwrap();
    relay.on_tick(TS + 180_000).await;
    assert_eq!(log.status_frames().len(), 1);

    // The heartbeat never re-arms cue transmission
    relay.on_cue(event).await.unwrap();
    assert_eq!(relay.stats().duplicates_skipped, 1);
    assert_eq!(relay.stats().heartbeats, 1);
}

#[tokio::test]
async fn test_radio_cycle_recovers_the_link() {
    let (mut relay, log) = controller(MockTransport::new());
    relay.start().await.unwrap();

    relay.on_connectivity(ConnectivitySignal::RadioDisabled).await;
    assert_eq!(relay.link().state(), LinkState::Idle);
    assert!(relay
        .on_cue(nav_event(
            "500 m - Main Street",
            "2 min \u{b7} 500 m \u{b7} 14:32",
        ))
        .await
        .is_err());

    relay.on_connectivity(ConnectivitySignal::RadioEnabled).await;
    assert_eq!(relay.link().state(), LinkState::Ready);
    log.clear();
    relay
        .on_cue(nav_event(
            "400 m - Main Street",
            "2 min \u{b7} 400 m \u{b7} 14:32",
        ))
        .await
        .unwrap();
    assert_eq!(log.message_frames().len(), 5);
}

#[tokio::test]
async fn test_link_loss_reconnects_automatically() {
    let reconnect = ReconnectConfig {
        enabled: true,
        initial_delay: Duration::from_millis(1),
        max_attempts: 3,
        ..Default::default()
    };
    let (mut link, _status) = LinkStateMachine::new(
        MockTransport::new(),
        PeripheralConfig::default(),
        reconnect,
    );
    link.connect("24:0A:C4:13:58:EA".parse().unwrap())
        .await
        .unwrap();
    link.on_link_loss().await;
    assert_eq!(link.state(), LinkState::Ready);
}

#[tokio::test]
async fn test_service_end_to_end() {
    init_tracing();
    let transport = MockTransport::new();
    let log = transport.log();
    let config = RelayConfigBuilder::new()
        .peripheral_address("24:0A:C4:13:58:EA".parse().unwrap())
        .auto_reconnect(false)
        .build();
    let (service, handle, status) = RelayService::new(config, transport, FixedPower(64));
    let join = tokio::spawn(service.run());

    handle
        .notify(nav_event(
            "500 m - Main Street",
            "2 min \u{b7} 500 m \u{b7} 14:32",
        ))
        .await
        .unwrap();
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.transmissions, 1);
    assert_eq!(log.message_frames().len(), 5);
    assert!(status.borrow().starts_with("Connected to"));

    handle.shutdown().await.unwrap();
    join.await.unwrap().unwrap();
    assert_eq!(*status.borrow(), "Disconnected");
}
