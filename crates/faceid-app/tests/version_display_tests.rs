//! Integration tests for VERSION propagation into the client view.

use std::fs;

use faceid_app::{ClientConfig, FaceIdClient, app_version};
use faceid_capture::SyntheticCamera;
use faceid_channel::MemoryTransport;
use faceid_overlay::{RecordingSurface, VideoGeometry};

#[test]
fn version_display_tests_matches_root_version_file() {
    let root_version_path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../VERSION");
    let root_version = fs::read_to_string(root_version_path).expect("VERSION should be readable");
    assert_eq!(app_version(), root_version.trim());
}

#[test]
fn version_display_tests_view_carries_app_version() {
    let (transport, _wire) = MemoryTransport::new();
    let (camera, _probe) = SyntheticCamera::new();
    let client = FaceIdClient::new(
        ClientConfig::default(),
        Box::new(transport),
        Box::new(camera),
        RecordingSurface::new(VideoGeometry::new(640.0, 480.0, 640, 480)),
    )
    .expect("client should build");

    assert_eq!(client.view().version, app_version());
}
