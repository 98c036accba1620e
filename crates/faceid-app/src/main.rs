#![warn(missing_docs)]
//! # faceid-app binary
//!
//! Prints version and effective configuration. With `--demo`, runs one
//! scripted face-login session against in-memory collaborators.

use faceid_app::{AppError, ClientConfig, FaceIdClient, app_version};
use faceid_capture::SyntheticCamera;
use faceid_channel::{MemoryTransport, TransportEvent};
use faceid_core::{BoundingBox, Credentials};
use faceid_overlay::{RasterSurface, VideoGeometry};
use faceid_protocol::{
    EVENT_FACE_DETECTION, EVENT_FACE_VERIFICATION, EVENT_LOGIN_RESULT, EVENT_STATUS, FaceDetectionMessage,
    FaceVerificationMessage, LoginResultMessage, StatusMessage, encode_event,
};

/// CLI entry point.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("faceid-app: {error}");
            std::process::exit(2);
        }
    };

    println!("faceid-app {}", app_version());
    println!(
        "server={} sample_interval_ms={} verify_timeout_ms={}",
        config.channel.endpoint, config.capture.sample_interval_ms, config.verify_timeout_ms
    );

    if std::env::args().skip(1).any(|arg| arg == "--demo")
        && let Err(error) = run_demo(config)
    {
        eprintln!("demo failed: {error}");
        std::process::exit(1);
    }
}

fn run_demo(config: ClientConfig) -> Result<(), AppError> {
    let interval = config.capture.sample_interval_ms;
    let (transport, wire) = MemoryTransport::new();
    let (camera, _camera_probe) = SyntheticCamera::new();
    let surface = RasterSurface::new(VideoGeometry::new(320.0, 240.0, 640, 480));
    let mut client = FaceIdClient::new(config, Box::new(transport), Box::new(camera), surface)?;

    let mut now = 0;
    client.connect(now);
    now += 20;
    client.on_transport_event(TransportEvent::Opened, now);
    server_says(&mut client, EVENT_STATUS, &StatusMessage { msg: "Connected to server".to_string() }, now)?;
    println!("connection: {}", client.view().indicator.text());

    client.submit_login(&Credentials::new("maitri", "secret"))?;
    server_says(
        &mut client,
        EVENT_LOGIN_RESULT,
        &LoginResultMessage {
            success: true,
            username: Some("maitri".to_string()),
            requires_face_id: Some(true),
            message: None,
        },
        now,
    )?;

    client.start(now)?;
    println!("status: {}", client.view().status);

    now += interval;
    client.advance(now);
    println!("frames sent: {}", wire.take_sent().len());

    server_says(
        &mut client,
        EVENT_FACE_DETECTION,
        &FaceDetectionMessage {
            message: Some("Face detected and ready for verification".to_string()),
            bounding_boxes: vec![BoundingBox::new(100.0, 100.0, 50.0, 50.0)],
        },
        now,
    )?;
    println!(
        "status: {} (overlay pixels painted: {})",
        client.view().status,
        client.overlay().surface().painted_pixels()
    );

    now += 50;
    client.verify(now)?;
    println!("status: {}", client.view().status);
    server_says(
        &mut client,
        EVENT_FACE_VERIFICATION,
        &FaceVerificationMessage {
            success: true,
            username: Some("maitri".to_string()),
            message: Some("Face verified successfully".to_string()),
        },
        now,
    )?;
    println!("status: {}", client.view().status);

    now += client.config().pauses.success_ms;
    client.advance(now);
    for notification in client.take_notifications() {
        println!("notice: {}", notification.message());
    }
    println!("final state: {:?}, camera live: {}", client.state(), client.camera_live());

    client.disconnect(now);
    println!("connection: {}", client.view().indicator.text());
    Ok(())
}

fn server_says<T: serde::Serialize>(
    client: &mut FaceIdClient<RasterSurface>,
    event: &str,
    payload: &T,
    now_ms: u64,
) -> Result<(), AppError> {
    let frame = encode_event(event, payload)?;
    client.on_transport_event(TransportEvent::Frame(frame), now_ms);
    Ok(())
}
