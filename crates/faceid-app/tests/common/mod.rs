//! Shared fixtures for app integration tests.

use faceid_app::{ClientConfig, FaceIdClient};
use faceid_capture::{CameraProbe, SyntheticCamera};
use faceid_channel::{MemoryTransport, TransportEvent, TransportProbe};
use faceid_overlay::{RecordingSurface, VideoGeometry};
use faceid_protocol::{decode_event, encode_event};
use serde_json::Value;

/// Client wired to in-memory collaborators plus their probes.
pub struct Harness {
    /// Client under test.
    pub client: FaceIdClient<RecordingSurface>,
    /// Outbound frames and connect/close counters.
    pub wire: TransportProbe,
    /// Camera open/release counters and fault injection.
    pub camera: CameraProbe,
}

/// Builds a harness whose video is displayed at native 640×480.
#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(ClientConfig::default(), VideoGeometry::new(640.0, 480.0, 640, 480))
}

/// Builds a harness with custom configuration and video geometry.
#[allow(dead_code)]
pub fn harness_with(config: ClientConfig, geometry: VideoGeometry) -> Harness {
    let (transport, wire) = MemoryTransport::new();
    let (camera_backend, camera) = SyntheticCamera::new();
    let client = FaceIdClient::new(
        config,
        Box::new(transport),
        Box::new(camera_backend),
        RecordingSurface::new(geometry),
    )
    .expect("client fixture should build");
    Harness { client, wire, camera }
}

impl Harness {
    /// Opens the channel and completes the connect at `now_ms`.
    #[allow(dead_code)]
    pub fn connect(&mut self, now_ms: u64) {
        self.client.connect(now_ms);
        self.client.on_transport_event(TransportEvent::Opened, now_ms);
    }

    /// Connects and starts a scanning session at `now_ms`.
    #[allow(dead_code)]
    pub fn scanning(&mut self, now_ms: u64) {
        self.connect(now_ms);
        self.client.start(now_ms).expect("session should start");
    }

    /// Delivers one server event.
    #[allow(dead_code)]
    pub fn server(&mut self, event: &str, payload: Value, now_ms: u64) {
        let frame = encode_event(event, &payload).expect("fixture payload should encode");
        self.client.on_transport_event(TransportEvent::Frame(frame), now_ms);
    }

    /// Delivers a `face_detection` with the given `(x, y, w, h)` boxes.
    #[allow(dead_code)]
    pub fn detection(&mut self, boxes: &[(f64, f64, f64, f64)], now_ms: u64) {
        let boxes: Vec<Value> = boxes
            .iter()
            .map(|(x, y, width, height)| serde_json::json!({"x": x, "y": y, "width": width, "height": height}))
            .collect();
        self.server(
            "face_detection",
            serde_json::json!({"message": "server text", "bounding_boxes": boxes}),
            now_ms,
        );
    }

    /// Delivers a `face_verification` verdict.
    #[allow(dead_code)]
    pub fn verdict(&mut self, success: bool, now_ms: u64) {
        let payload = if success {
            serde_json::json!({"success": true, "username": "maitri", "message": "Face verified successfully"})
        } else {
            serde_json::json!({"success": false, "message": "Face not recognized in database"})
        };
        self.server("face_verification", payload, now_ms);
    }

    /// Drains outbound frames and returns their event names.
    #[allow(dead_code)]
    pub fn sent_events(&self) -> Vec<String> {
        self.wire
            .take_sent()
            .iter()
            .filter_map(|frame| decode_event(frame).ok().flatten())
            .map(|packet| packet.event)
            .collect()
    }
}
