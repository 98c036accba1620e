//! Validates wire fixtures and encoded client payloads against frozen JSON
//! schemas.

use faceid_core::{BoundingBox, Credentials, Frame};
use faceid_protocol::{
    EVENT_DETECT_FACE, EVENT_LOGIN, FaceDetectionMessage, ImageRequest, InboundMessage, LoginRequest, decode_event,
    decode_inbound, encode_event,
};
use jsonschema::JSONSchema;
use serde_json::Value;

macro_rules! contract_path {
    ($file:literal) => {
        concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts/", $file)
    };
}

fn load_json(path: &str) -> Value {
    let raw = std::fs::read_to_string(path).expect("json file should be readable");
    serde_json::from_str(&raw).expect("json file should be valid")
}

fn compile_validator(schema_path: &str) -> JSONSchema {
    let schema = load_json(schema_path);
    JSONSchema::compile(&schema).expect("schema should compile")
}

fn assert_fixture_valid(schema_path: &str, fixture_path: &str) {
    let validator = compile_validator(schema_path);
    let fixture = load_json(fixture_path);
    assert!(validator.is_valid(&fixture), "{fixture_path} should validate against {schema_path}");
}

fn encoded_payload(event: &str, frame: &str) -> Value {
    let packet = decode_event(frame)
        .expect("encoded frame should decode")
        .expect("encoded frame should be an event");
    assert_eq!(packet.event, event);
    packet.payload
}

#[test]
fn outbound_fixtures_match_schemas() {
    assert_fixture_valid(contract_path!("login.schema.json"), contract_path!("fixtures/login.valid.json"));
    assert_fixture_valid(
        contract_path!("image-request.schema.json"),
        contract_path!("fixtures/detect-face.valid.json"),
    );
}

#[test]
fn inbound_fixtures_match_schemas() {
    assert_fixture_valid(
        contract_path!("face-detection.schema.json"),
        contract_path!("fixtures/face-detection.valid.json"),
    );
    assert_fixture_valid(
        contract_path!("face-detection.schema.json"),
        contract_path!("fixtures/face-detection.no-face.valid.json"),
    );
    assert_fixture_valid(
        contract_path!("face-verification.schema.json"),
        contract_path!("fixtures/face-verification.valid.json"),
    );
    assert_fixture_valid(
        contract_path!("login-result.schema.json"),
        contract_path!("fixtures/login-result.valid.json"),
    );
}

#[test]
fn encoded_image_request_matches_schema() {
    let frame = Frame::new(640, 480, 0, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).expect("frame should build");
    let packet = encode_event(EVENT_DETECT_FACE, &ImageRequest { image: frame.data_uri() })
        .expect("request should encode");

    let validator = compile_validator(contract_path!("image-request.schema.json"));
    assert!(validator.is_valid(&encoded_payload(EVENT_DETECT_FACE, &packet)));
}

#[test]
fn encoded_login_request_matches_schema() {
    let credentials = Credentials::new("maitri", "correct horse");
    let packet = encode_event(
        EVENT_LOGIN,
        &LoginRequest {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        },
    )
    .expect("request should encode");

    let validator = compile_validator(contract_path!("login.schema.json"));
    assert!(validator.is_valid(&encoded_payload(EVENT_LOGIN, &packet)));
}

#[test]
fn detection_fixture_decodes_into_boxes() {
    let fixture = load_json(contract_path!("fixtures/face-detection.valid.json"));
    let wire: FaceDetectionMessage = serde_json::from_value(fixture.clone()).expect("fixture should deserialize");
    assert_eq!(wire.bounding_boxes, vec![BoundingBox::new(100.0, 100.0, 50.0, 50.0)]);

    let frame = format!("42[\"face_detection\",{fixture}]");
    let message = decode_inbound(&frame)
        .expect("fixture frame should decode")
        .expect("fixture frame should be an event");
    match message {
        InboundMessage::Detection(outcome) => assert!(outcome.has_face()),
        other => panic!("expected a detection message, got {other:?}"),
    }
}
