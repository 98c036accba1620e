//! Integration tests for when frame sampling may run.

mod common;

use faceid_channel::TransportEvent;
use faceid_core::SessionState;

fn sampling_should_run(harness: &common::Harness) -> bool {
    harness.client.state().samples_frames() && harness.client.channel().is_connected() && harness.client.camera_live()
}

#[test]
fn sampling_invariant_tests_tracks_state_connection_and_camera() {
    let mut harness = common::harness();
    assert!(!harness.client.sampling_active());

    harness.scanning(0);
    assert!(harness.client.sampling_active());
    assert_eq!(harness.client.sampling_active(), sampling_should_run(&harness));

    harness.detection(&[(100.0, 100.0, 50.0, 50.0)], 500);
    assert_eq!(harness.client.state(), SessionState::FaceFound);
    assert!(harness.client.sampling_active());

    harness.client.on_transport_event(
        TransportEvent::Closed {
            reason: "transport close".to_string(),
        },
        600,
    );
    assert!(!harness.client.sampling_active());
    assert_eq!(harness.client.sampling_active(), sampling_should_run(&harness));

    harness.client.advance(1_600);
    harness.client.on_transport_event(TransportEvent::Opened, 1_650);
    assert!(harness.client.sampling_active());

    harness.client.verify(1_700).expect("verify should send");
    assert_eq!(harness.client.state(), SessionState::Verifying);
    assert!(!harness.client.sampling_active());

    harness.client.cancel();
    assert!(!harness.client.sampling_active());
    assert_eq!(harness.client.sampling_active(), sampling_should_run(&harness));
}

#[test]
fn sampling_invariant_tests_sends_detect_every_interval_while_scanning() {
    let mut harness = common::harness();
    harness.scanning(0);
    harness.sent_events();

    for now in [250, 500, 750, 1_000, 1_250, 1_500] {
        harness.client.advance(now);
    }

    assert_eq!(harness.sent_events(), vec!["detect_face"; 3]);
    assert_eq!(harness.camera.grabs(), 3);
}

#[test]
fn sampling_invariant_tests_sends_nothing_while_disconnected() {
    let mut harness = common::harness();
    harness.scanning(0);
    harness.client.on_transport_event(
        TransportEvent::Closed {
            reason: "ping timeout".to_string(),
        },
        100,
    );
    harness.sent_events();

    harness.client.advance(500);
    harness.client.advance(999);

    assert!(harness.sent_events().is_empty());
    assert_eq!(harness.camera.grabs(), 0);
}

#[test]
fn sampling_invariant_tests_denied_camera_leaves_session_idle() {
    let mut harness = common::harness();
    harness.connect(0);
    harness.camera.deny_permission(true);

    let result = harness.client.start(10);

    assert!(matches!(result, Err(faceid_app::AppError::CaptureDenied(_))));
    assert_eq!(harness.client.state(), SessionState::Idle);
    assert_eq!(
        harness.client.view().status,
        "Camera access denied. Please allow camera permissions."
    );
    assert!(!harness.client.sampling_active());
    assert!(!harness.client.camera_live());

    harness.client.advance(2_000);
    assert!(harness.sent_events().is_empty());
}

#[test]
fn sampling_invariant_tests_start_requires_connection() {
    let mut harness = common::harness();

    let result = harness.client.start(0);

    assert!(matches!(result, Err(faceid_app::AppError::Connectivity(_))));
    assert_eq!(harness.camera.opened(), 0);
    let notices: Vec<String> = harness
        .client
        .take_notifications()
        .iter()
        .map(|notice| notice.message())
        .collect();
    assert_eq!(
        notices,
        vec!["Not connected to server. Please check if the backend is running.".to_string()]
    );
}

#[test]
fn sampling_invariant_tests_rejects_overlapping_sessions() {
    let mut harness = common::harness();
    harness.scanning(0);

    let second = harness.client.start(10);

    assert!(matches!(second, Err(faceid_app::AppError::Session(_))));
    assert_eq!(harness.camera.opened(), 1);
}
