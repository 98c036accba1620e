//! Integration tests for the detect -> verify handshake and its pauses.

mod common;

use faceid_core::SessionState;
use faceid_ui::Notification;

fn face_found() -> common::Harness {
    let mut harness = common::harness();
    harness.scanning(0);
    harness.detection(&[(100.0, 100.0, 50.0, 50.0)], 500);
    harness.sent_events();
    harness
}

#[test]
fn verification_flow_tests_verify_is_noop_outside_face_found() {
    let mut harness = common::harness();
    assert!(!harness.client.verify(0).expect("idle verify is a no-op"));

    harness.scanning(0);
    assert!(!harness.client.verify(10).expect("scanning verify is a no-op"));
    assert!(!harness.client.view().verify_available);

    harness.detection(&[(1.0, 1.0, 5.0, 5.0)], 500);
    assert!(harness.client.view().verify_available);
    assert!(harness.client.verify(600).expect("face-found verify sends"));
    assert!(!harness.client.verify(700).expect("second verify is a no-op"));

    let verifies = harness.sent_events().iter().filter(|event| *event == "verify_face").count();
    assert_eq!(verifies, 1);
    assert_eq!(harness.client.protocol().verifies_sent(), 1);
}

#[test]
fn verification_flow_tests_success_welcomes_after_one_second_and_releases_camera() {
    let mut harness = face_found();
    harness.client.verify(600).expect("verify should send");
    assert_eq!(harness.client.view().status, "Verifying face... Please hold still");
    assert!(!harness.client.view().verify_available);

    harness.verdict(true, 700);
    assert_eq!(harness.client.state(), SessionState::VerifiedOk);
    assert_eq!(harness.client.view().status, "Face verified successfully!");

    harness.client.advance(1_699);
    assert!(harness.client.take_notifications().is_empty());
    assert!(harness.client.camera_live());

    harness.client.advance(1_700);
    assert_eq!(
        harness.client.take_notifications(),
        vec![Notification::Welcome("maitri".to_string())]
    );
    assert_eq!(harness.client.state(), SessionState::Idle);
    assert!(!harness.client.camera_live());
    assert_eq!(harness.camera.released(), 1);
    assert!(!harness.client.sampling_active());
}

#[test]
fn verification_flow_tests_failure_resumes_scanning_after_three_seconds() {
    let mut harness = face_found();
    harness.client.verify(600).expect("verify should send");

    harness.verdict(false, 800);
    assert_eq!(harness.client.state(), SessionState::VerifiedFailed);
    assert_eq!(
        harness.client.view().status,
        "Face verification failed. Please try again."
    );
    assert!(!harness.client.sampling_active());

    harness.client.advance(3_799);
    assert_eq!(harness.client.state(), SessionState::VerifiedFailed);

    harness.client.advance(3_800);
    assert_eq!(harness.client.state(), SessionState::Scanning);
    assert!(harness.client.view().status.is_empty());
    assert!(harness.client.sampling_active());
    assert!(harness.client.camera_live());

    harness.sent_events();
    harness.client.advance(4_300);
    assert_eq!(harness.sent_events(), vec!["detect_face"]);
}

#[test]
fn verification_flow_tests_unanswered_verify_times_out_as_failure() {
    let mut harness = face_found();
    harness.client.verify(600).expect("verify should send");

    harness.client.advance(10_599);
    assert_eq!(harness.client.state(), SessionState::Verifying);

    harness.client.advance(10_600);
    assert_eq!(harness.client.state(), SessionState::VerifiedFailed);

    harness.client.advance(13_600);
    assert_eq!(harness.client.state(), SessionState::Scanning);
}

#[test]
fn verification_flow_tests_cancel_during_pause_drops_continuation() {
    let mut harness = face_found();
    harness.client.verify(600).expect("verify should send");
    harness.verdict(true, 700);

    assert!(harness.client.cancel());
    assert!(!harness.client.pause_pending());
    harness.client.advance(5_000);

    assert!(harness.client.take_notifications().is_empty());
    assert_eq!(harness.client.state(), SessionState::Idle);
    assert_eq!(harness.camera.released(), 1);
}

#[test]
fn verification_flow_tests_late_verdict_after_cancel_is_ignored() {
    let mut harness = face_found();
    harness.client.verify(600).expect("verify should send");
    harness.client.cancel();

    harness.verdict(true, 700);
    harness.client.advance(2_000);

    assert_eq!(harness.client.state(), SessionState::Idle);
    assert!(harness.client.take_notifications().is_empty());
}

#[test]
fn verification_flow_tests_detection_while_verifying_is_ignored() {
    let mut harness = face_found();
    harness.client.verify(600).expect("verify should send");

    harness.detection(&[], 650);

    assert_eq!(harness.client.state(), SessionState::Verifying);
    assert_eq!(harness.client.overlay().surface().visible_rects().len(), 1);
}
