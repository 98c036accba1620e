//! Integration tests for camera release on cancel and stream loss.

mod common;

use faceid_core::SessionState;

#[test]
fn capture_teardown_tests_double_cancel_releases_once() {
    let mut harness = common::harness();
    harness.scanning(0);
    harness.detection(&[(100.0, 100.0, 50.0, 50.0)], 500);

    assert!(harness.client.cancel());
    assert!(!harness.client.cancel());

    assert_eq!(harness.camera.released(), 1);
    assert_eq!(harness.client.state(), SessionState::Idle);
    assert!(harness.client.view().status.is_empty());
    assert!(harness.client.overlay().surface().visible_rects().is_empty());
    assert!(!harness.client.sampling_active());
}

#[test]
fn capture_teardown_tests_repeated_sessions_never_leak_tracks() {
    let mut harness = common::harness();
    harness.connect(0);

    for round in 0..3_u64 {
        let now = round * 10_000;
        harness.client.start(now).expect("session should start");
        harness.client.advance(now + 500);
        harness.client.cancel();
    }

    assert_eq!(harness.camera.opened(), 3);
    assert_eq!(harness.camera.released(), 3);
}

#[test]
fn capture_teardown_tests_stream_loss_returns_to_idle() {
    let mut harness = common::harness();
    harness.scanning(0);
    harness.camera.end_stream_after(1);

    harness.client.advance(500);
    assert_eq!(harness.client.state(), SessionState::Scanning);

    harness.client.advance(1_000);
    assert_eq!(harness.client.state(), SessionState::Idle);
    assert!(!harness.client.camera_live());
    assert_eq!(harness.camera.released(), 1);
    assert!(!harness.client.view().status.is_empty());

    harness.client.advance(1_500);
    assert_eq!(harness.camera.grabs(), 1);
}

#[test]
fn capture_teardown_tests_disconnect_closes_channel_and_session() {
    let mut harness = common::harness();
    harness.scanning(0);

    harness.client.disconnect(100);

    assert_eq!(harness.client.state(), SessionState::Idle);
    assert!(!harness.client.channel().is_connected());
    assert_eq!(harness.camera.released(), 1);
    assert_eq!(harness.client.view().indicator.text(), "Disconnected");
}
