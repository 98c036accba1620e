#![warn(missing_docs)]
//! # faceid-protocol
//!
//! ## Purpose
//! Defines the application messages exchanged with the detection service and
//! how their outcomes drive the session.
//!
//! ## Responsibilities
//! - Encode `login`, `detect_face`, `verify_face` requests as Socket.IO
//!   EVENT packets.
//! - Decode `face_detection`, `face_verification`, `login_result` and
//!   `status` packets into typed outcomes.
//! - Treat malformed or missing bounding-box lists as "no face".
//! - Compute the session reaction (next state, overlay action, status text,
//!   pause) for each outcome.
//!
//! ## Data flow
//! Frame -> [`DetectionProtocol::send_detect`] -> channel.
//! Channel message -> [`decode_inbound`] -> [`InboundMessage`] ->
//! [`react_to_detection`] / [`react_to_verification`] -> session orchestrator.
//!
//! ## Ownership and lifetimes
//! Sends borrow the channel explicitly; decoded outcomes are owned values
//! independent of the inbound text buffer.
//!
//! ## Error model
//! Encoding and channel failures return [`ProtocolError`]. Inbound packets
//! that are not events yield `Ok(None)`; a detection payload with a bad box
//! list never errors.
//!
//! ## Security and privacy notes
//! Image data URIs and passwords never appear in log output.

use faceid_channel::{ChannelConnection, ChannelError};
use faceid_core::{
    BoundingBox, Credentials, DetectionOutcome, Frame, LoginOutcome, SessionState,
    VerificationOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outbound credential login event.
pub const EVENT_LOGIN: &str = "login";
/// Outbound detection request event.
pub const EVENT_DETECT_FACE: &str = "detect_face";
/// Outbound verification request event.
pub const EVENT_VERIFY_FACE: &str = "verify_face";
/// Inbound credential login result event.
pub const EVENT_LOGIN_RESULT: &str = "login_result";
/// Inbound detection result event.
pub const EVENT_FACE_DETECTION: &str = "face_detection";
/// Inbound verification result event.
pub const EVENT_FACE_VERIFICATION: &str = "face_verification";
/// Inbound server greeting event.
pub const EVENT_STATUS: &str = "status";

/// Socket.IO prefix of an EVENT packet carried in an Engine.IO MESSAGE.
pub const EVENT_PACKET_PREFIX: &str = "42";

/// Status text while at least one face is in view.
pub const STATUS_FACE_DETECTED: &str = "Face detected! Ready to verify";
/// Status text while searching.
pub const STATUS_SEARCHING: &str = "Looking for face...";
/// Status text while a verify request is in flight.
pub const STATUS_VERIFYING: &str = "Verifying face... Please hold still";
/// Status text after a successful verification.
pub const STATUS_VERIFIED: &str = "Face verified successfully!";
/// Status text after a failed verification.
pub const STATUS_VERIFY_FAILED: &str = "Face verification failed. Please try again.";

/// Pause between a successful verification and teardown.
pub const SUCCESS_PAUSE_MS: u64 = 1_000;
/// Pause between a failed verification and resumed scanning.
pub const FAILURE_PAUSE_MS: u64 = 3_000;

/// `login` payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// `detect_face` / `verify_face` payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// JPEG still as a data URI.
    pub image: String,
}

/// `face_detection` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetectionMessage {
    /// Server explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Detected faces in source-frame coordinates.
    #[serde(default)]
    pub bounding_boxes: Vec<BoundingBox>,
}

/// `face_verification` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceVerificationMessage {
    /// Verdict.
    #[serde(default)]
    pub success: bool,
    /// Matched account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Server explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `login_result` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResultMessage {
    /// Verdict.
    #[serde(default)]
    pub success: bool,
    /// Account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Account must authenticate biometrically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_face_id: Option<bool>,
    /// Server explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `status` payload sent by the server on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Greeting text.
    #[serde(default)]
    pub msg: String,
}

/// One decoded Socket.IO event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPacket {
    /// Event name.
    pub event: String,
    /// First argument, `Null` when absent.
    pub payload: Value,
}

/// Typed inbound application message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `face_detection`.
    Detection(DetectionOutcome),
    /// `face_verification`.
    Verification(VerificationOutcome),
    /// `login_result`.
    Login(LoginOutcome),
    /// `status` greeting.
    Status(String),
    /// Any other event name.
    Unknown(String),
}

/// Encodes one event packet: `42["event",payload]`.
///
/// # Errors
/// Returns [`ProtocolError::Codec`] when the payload cannot be serialized.
pub fn encode_event<T: Serialize>(event: &str, payload: &T) -> Result<String, ProtocolError> {
    let body = serde_json::to_string(&(event, payload))?;
    Ok(format!("{EVENT_PACKET_PREFIX}{body}"))
}

/// Decodes one inbound text frame.
///
/// Returns `Ok(None)` for non-event packets (pings, connect acks).
///
/// # Errors
/// Returns [`ProtocolError::MalformedPacket`] when an event packet does not
/// carry a JSON array headed by an event name.
pub fn decode_event(frame: &str) -> Result<Option<EventPacket>, ProtocolError> {
    let Some(mut rest) = frame.strip_prefix(EVENT_PACKET_PREFIX) else {
        return Ok(None);
    };

    // Optional namespace (`/admin,`) and ack id (`12`) precede the array.
    if rest.starts_with('/') {
        rest = rest.split_once(',').map_or("", |(_, tail)| tail);
    }
    rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    let mut items: Vec<Value> = serde_json::from_str(rest)
        .map_err(|error| ProtocolError::MalformedPacket(format!("event body: {error}")))?;
    if items.is_empty() {
        return Err(ProtocolError::MalformedPacket("empty event array".to_string()));
    }

    let payload = if items.len() > 1 {
        items.swap_remove(1)
    } else {
        Value::Null
    };
    let Value::String(event) = items.swap_remove(0) else {
        return Err(ProtocolError::MalformedPacket("event name is not a string".to_string()));
    };

    Ok(Some(EventPacket { event, payload }))
}

/// Decodes one inbound frame into a typed message.
///
/// # Errors
/// Propagates [`decode_event`] errors and rejects verification or login
/// payloads that are not JSON objects.
pub fn decode_inbound(frame: &str) -> Result<Option<InboundMessage>, ProtocolError> {
    let Some(packet) = decode_event(frame)? else {
        return Ok(None);
    };

    let message = match packet.event.as_str() {
        EVENT_FACE_DETECTION => InboundMessage::Detection(parse_detection(&packet.payload)),
        EVENT_FACE_VERIFICATION => {
            let wire: FaceVerificationMessage = from_payload(packet.payload, EVENT_FACE_VERIFICATION)?;
            InboundMessage::Verification(VerificationOutcome {
                success: wire.success,
                username: wire.username,
                message: wire.message.unwrap_or_default(),
            })
        }
        EVENT_LOGIN_RESULT => {
            let wire: LoginResultMessage = from_payload(packet.payload, EVENT_LOGIN_RESULT)?;
            InboundMessage::Login(LoginOutcome {
                success: wire.success,
                username: wire.username,
                requires_face_id: wire.requires_face_id.unwrap_or(false),
                message: wire.message,
            })
        }
        EVENT_STATUS => {
            let wire: StatusMessage = from_payload(packet.payload, EVENT_STATUS)?;
            InboundMessage::Status(wire.msg)
        }
        _ => InboundMessage::Unknown(packet.event),
    };

    Ok(Some(message))
}

/// Interprets a `face_detection` payload.
///
/// A missing, non-array, or partly malformed `bounding_boxes` list yields an
/// outcome with no boxes.
pub fn parse_detection(payload: &Value) -> DetectionOutcome {
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let boxes = payload
        .get("bounding_boxes")
        .and_then(Value::as_array)
        .and_then(|entries| entries.iter().map(parse_box).collect::<Option<Vec<_>>>())
        .unwrap_or_default();

    DetectionOutcome { message, boxes }
}

fn parse_box(entry: &Value) -> Option<BoundingBox> {
    let field = |name: &str| entry.get(name).and_then(Value::as_f64);
    let parsed = BoundingBox::new(field("x")?, field("y")?, field("width")?, field("height")?);
    (parsed.is_finite() && parsed.width >= 0.0 && parsed.height >= 0.0).then_some(parsed)
}

fn from_payload<T: for<'de> Deserialize<'de>>(payload: Value, event: &str) -> Result<T, ProtocolError> {
    serde_json::from_value(payload)
        .map_err(|error| ProtocolError::MalformedPacket(format!("{event} payload: {error}")))
}

/// Sends `login` for `credentials`.
///
/// # Errors
/// Returns [`ProtocolError::Channel`] when the channel refuses the frame.
pub fn send_login(channel: &mut ChannelConnection, credentials: &Credentials) -> Result<(), ProtocolError> {
    let frame = encode_event(
        EVENT_LOGIN,
        &LoginRequest {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        },
    )?;
    channel.emit(&frame)?;
    log::info!("login request sent for {}", credentials.username);
    Ok(())
}

/// Outbound detect/verify requests. Fire-and-continue: replies arrive later
/// through the channel's event stream.
#[derive(Debug, Default)]
pub struct DetectionProtocol {
    detects_sent: u64,
    verifies_sent: u64,
}

impl DetectionProtocol {
    /// Creates a protocol handler with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `detect_face` with `frame`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Channel`] when the channel is not connected.
    pub fn send_detect(&mut self, channel: &mut ChannelConnection, frame: &Frame) -> Result<(), ProtocolError> {
        send_image(channel, EVENT_DETECT_FACE, frame)?;
        self.detects_sent += 1;
        Ok(())
    }

    /// Sends `verify_face` with `frame`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Channel`] when the channel is not connected.
    pub fn send_verify(&mut self, channel: &mut ChannelConnection, frame: &Frame) -> Result<(), ProtocolError> {
        send_image(channel, EVENT_VERIFY_FACE, frame)?;
        self.verifies_sent += 1;
        Ok(())
    }

    /// Detect requests sent so far.
    pub fn detects_sent(&self) -> u64 {
        self.detects_sent
    }

    /// Verify requests sent so far.
    pub fn verifies_sent(&self) -> u64 {
        self.verifies_sent
    }
}

fn send_image(channel: &mut ChannelConnection, event: &str, frame: &Frame) -> Result<(), ProtocolError> {
    let packet = encode_event(event, &ImageRequest { image: frame.data_uri() })?;
    channel.emit(&packet)?;
    log::debug!("{event} sent for frame {}", frame.fingerprint());
    Ok(())
}

/// Overlay action requested by a detection outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayAction {
    /// Replace the overlay with these boxes.
    Draw(Vec<BoundingBox>),
    /// Erase the overlay.
    Clear,
}

/// What the session does with one detection outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReaction {
    /// Next session state (`FaceFound` or `Scanning`).
    pub next_state: SessionState,
    /// Overlay update.
    pub overlay: OverlayAction,
    /// Status text; fixed, overriding the server message.
    pub status: &'static str,
}

/// Maps a detection outcome onto the session reaction.
pub fn react_to_detection(outcome: &DetectionOutcome) -> DetectionReaction {
    if outcome.has_face() {
        DetectionReaction {
            next_state: SessionState::FaceFound,
            overlay: OverlayAction::Draw(outcome.boxes.clone()),
            status: STATUS_FACE_DETECTED,
        }
    } else {
        DetectionReaction {
            next_state: SessionState::Scanning,
            overlay: OverlayAction::Clear,
            status: STATUS_SEARCHING,
        }
    }
}

/// Pause lengths applied after a verification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPauses {
    /// Delay before the welcome notification and teardown.
    pub success_ms: u64,
    /// Delay before the message clears and scanning resumes.
    pub failure_ms: u64,
}

impl Default for VerificationPauses {
    fn default() -> Self {
        Self {
            success_ms: SUCCESS_PAUSE_MS,
            failure_ms: FAILURE_PAUSE_MS,
        }
    }
}

/// What the session does with one verification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReaction {
    /// Next session state (`VerifiedOk` or `VerifiedFailed`).
    pub next_state: SessionState,
    /// Status text shown during the pause.
    pub status: &'static str,
    /// Pause before the follow-up continuation runs.
    pub pause_ms: u64,
    /// Matched account, on success.
    pub username: Option<String>,
}

/// Maps a verification outcome onto the session reaction.
pub fn react_to_verification(outcome: &VerificationOutcome, pauses: VerificationPauses) -> VerificationReaction {
    if outcome.success {
        VerificationReaction {
            next_state: SessionState::VerifiedOk,
            status: STATUS_VERIFIED,
            pause_ms: pauses.success_ms,
            username: outcome.username.clone(),
        }
    } else {
        VerificationReaction {
            next_state: SessionState::VerifiedFailed,
            status: STATUS_VERIFY_FAILED,
            pause_ms: pauses.failure_ms,
            username: None,
        }
    }
}

/// Protocol layer error type.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Channel refused the frame.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    /// JSON encoding failure.
    #[error("codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    /// Inbound packet does not follow the event framing.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
}
