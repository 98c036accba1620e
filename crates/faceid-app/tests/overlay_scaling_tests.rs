//! Integration tests for overlay projection and replacement.

mod common;

use approx::assert_relative_eq;
use faceid_app::ClientConfig;
use faceid_core::SessionState;
use faceid_overlay::VideoGeometry;

#[test]
fn overlay_scaling_tests_projects_source_box_to_displayed_size() {
    let mut harness = common::harness_with(ClientConfig::default(), VideoGeometry::new(320.0, 240.0, 640, 480));
    harness.scanning(0);

    harness.detection(&[(100.0, 100.0, 50.0, 50.0)], 500);

    let surface = harness.client.overlay().surface();
    let rects = surface.visible_rects();
    assert_eq!(rects.len(), 1);
    assert_relative_eq!(rects[0].x, 50.0);
    assert_relative_eq!(rects[0].y, 50.0);
    assert_relative_eq!(rects[0].width, 25.0);
    assert_relative_eq!(rects[0].height, 25.0);
    assert_eq!(surface.size(), (320, 240));
}

#[test]
fn overlay_scaling_tests_uses_independent_axis_factors() {
    let mut harness = common::harness_with(ClientConfig::default(), VideoGeometry::new(1280.0, 480.0, 640, 480));
    harness.scanning(0);

    harness.detection(&[(10.0, 20.0, 30.0, 40.0)], 500);

    let rects = harness.client.overlay().surface().visible_rects();
    assert_relative_eq!(rects[0].x, 20.0);
    assert_relative_eq!(rects[0].y, 20.0);
    assert_relative_eq!(rects[0].width, 60.0);
    assert_relative_eq!(rects[0].height, 40.0);
}

#[test]
fn overlay_scaling_tests_latest_outcome_replaces_previous_boxes() {
    let mut harness = common::harness();
    harness.scanning(0);

    harness.detection(&[(0.0, 0.0, 10.0, 10.0), (200.0, 200.0, 40.0, 40.0)], 500);
    assert_eq!(harness.client.overlay().surface().visible_rects().len(), 2);

    harness.detection(&[(300.0, 120.0, 60.0, 60.0)], 1_000);
    let rects = harness.client.overlay().surface().visible_rects();
    assert_eq!(rects.len(), 1);
    assert_relative_eq!(rects[0].x, 300.0);

    harness.detection(&[], 1_500);
    assert!(harness.client.overlay().surface().visible_rects().is_empty());
    assert_eq!(harness.client.state(), SessionState::Scanning);
    assert_eq!(harness.client.view().status, "Looking for face...");
}

#[test]
fn overlay_scaling_tests_tracks_layout_changes_between_draws() {
    let mut harness = common::harness();
    harness.scanning(0);
    harness.detection(&[(100.0, 100.0, 50.0, 50.0)], 500);

    harness
        .client
        .overlay_surface_mut()
        .set_video_geometry(VideoGeometry::new(320.0, 240.0, 640, 480));
    harness.detection(&[(100.0, 100.0, 50.0, 50.0)], 1_000);

    let surface = harness.client.overlay().surface();
    assert_eq!(surface.size(), (320, 240));
    assert_relative_eq!(surface.visible_rects()[0].width, 25.0);
}

#[test]
fn overlay_scaling_tests_malformed_box_list_clears_overlay() {
    let mut harness = common::harness();
    harness.scanning(0);
    harness.detection(&[(100.0, 100.0, 50.0, 50.0)], 500);

    harness.server(
        "face_detection",
        serde_json::json!({"bounding_boxes": [{"x": "left", "y": 0, "width": 1, "height": 1}]}),
        1_000,
    );

    assert!(harness.client.overlay().surface().visible_rects().is_empty());
    assert_eq!(harness.client.state(), SessionState::Scanning);
    assert!(!harness.client.view().verify_available);
}
