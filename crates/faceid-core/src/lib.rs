#![warn(missing_docs)]
//! # faceid-core
//!
//! ## Purpose
//! Defines the pure data model shared by every crate of the face-login client.
//!
//! ## Responsibilities
//! - Represent encoded capture frames and detection geometry.
//! - Represent server outcomes (detection, verification, login).
//! - Define the explicit session and connection state enums.
//! - Provide the cancellable [`Timer`] used for sampling, pauses and
//!   reconnection delays.
//!
//! ## Data flow
//! Capture code produces a [`Frame`], protocol code turns server replies into
//! [`DetectionOutcome`] / [`VerificationOutcome`] / [`LoginOutcome`], and the
//! session orchestrator maps those onto [`SessionState`] transitions.
//!
//! ## Ownership and lifetimes
//! Frames own their JPEG buffer (`Vec<u8>`) and are dropped right after they
//! are sent; nothing in this crate retains frames across sampling ticks.
//!
//! ## Error model
//! Frame validation failures return [`CoreError`].
//!
//! ## Security and privacy notes
//! Frames are identified in logs only by [`Frame::fingerprint`]. The
//! [`Credentials`] `Debug` output never contains the password.
//!
//! ## Example
//! ```rust
//! use faceid_core::{SessionState, Timer};
//!
//! assert!(SessionState::FaceFound.samples_frames());
//! let mut timer = Timer::default();
//! timer.arm_every(0, 500);
//! assert!(!timer.fire_if_due(499));
//! assert!(timer.fire_if_due(500));
//! ```

use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Capture target width in pixels; bounding boxes use this coordinate space.
pub const CAPTURE_WIDTH: u32 = 640;

/// Capture target height in pixels.
pub const CAPTURE_HEIGHT: u32 = 480;

/// MIME type of every encoded frame.
pub const FRAME_MIME: &str = "image/jpeg";

/// One encoded still image sampled from the live video.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded width in pixels.
    pub width: u32,
    /// Encoded height in pixels.
    pub height: u32,
    /// Capture time in milliseconds on the caller's clock.
    pub captured_at_ms: u64,
    /// JPEG bytes.
    pub jpeg: Vec<u8>,
}

impl Frame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyFrame`] for zero dimensions or an empty
    /// buffer.
    pub fn new(width: u32, height: u32, captured_at_ms: u64, jpeg: Vec<u8>) -> Result<Self, CoreError> {
        if width == 0 || height == 0 || jpeg.is_empty() {
            return Err(CoreError::EmptyFrame);
        }

        Ok(Self {
            width,
            height,
            captured_at_ms,
            jpeg,
        })
    }

    /// Renders the frame as a `data:image/jpeg;base64,...` URI, the form the
    /// detection service expects.
    pub fn data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.jpeg);
        format!("data:{FRAME_MIME};base64,{encoded}")
    }

    /// Short SHA-256 fingerprint of the encoded bytes, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.jpeg);
        hex::encode(&digest[..6])
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at_ms", &self.captured_at_ms)
            .field("jpeg_len", &self.jpeg.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Detected face rectangle in source-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl BoundingBox {
    /// Creates a box from its four components.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns `true` when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Result of one `detect_face` round trip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionOutcome {
    /// Server-supplied message; empty when absent.
    pub message: String,
    /// Detected faces, in server order. Empty means no face found.
    pub boxes: Vec<BoundingBox>,
}

impl DetectionOutcome {
    /// Returns `true` when at least one face was reported.
    pub fn has_face(&self) -> bool {
        !self.boxes.is_empty()
    }
}

/// Result of one `verify_face` round trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationOutcome {
    /// Whether the face matched an enrolled account.
    pub success: bool,
    /// Matched account name, when successful.
    pub username: Option<String>,
    /// Server-supplied explanation.
    pub message: String,
}

/// Result of one credential login round trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginOutcome {
    /// Whether the credentials were accepted.
    pub success: bool,
    /// Account name echoed by the server.
    pub username: Option<String>,
    /// Account demands biometric authentication instead.
    pub requires_face_id: bool,
    /// Server-supplied explanation.
    pub message: Option<String>,
}

/// Username/password pair typed by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns `true` when both fields are non-empty. Whitespace counts as input.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Biometric session state. Exactly one value is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No capture session; the machine may be started.
    #[default]
    Idle,
    /// Channel is being opened; no session yet.
    Connecting,
    /// Camera live, searching for a face.
    Scanning,
    /// Most recent detection reported at least one face.
    FaceFound,
    /// A verify request is in flight.
    Verifying,
    /// Verification succeeded; teardown pending.
    VerifiedOk,
    /// Verification failed; scanning resumes after a pause.
    VerifiedFailed,
}

impl SessionState {
    /// Returns `true` for the states in which frames are sampled.
    pub fn samples_frames(self) -> bool {
        matches!(self, Self::Scanning | Self::FaceFound)
    }

    /// Returns `true` when a verify request may be sent.
    pub fn allows_verify(self) -> bool {
        self == Self::FaceFound
    }

    /// Returns `true` while a camera session is owned.
    pub fn has_capture(self) -> bool {
        matches!(
            self,
            Self::Scanning | Self::FaceFound | Self::Verifying | Self::VerifiedOk | Self::VerifiedFailed
        )
    }
}

/// Channel connection status observed by every session component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// Initial connect or a reconnect attempt is in progress.
    #[default]
    Connecting,
    /// Channel is open.
    Connected,
    /// Channel is closed; an automatic reconnect may be pending.
    Disconnected,
    /// Automatic reconnection gave up; only a manual reopen recovers.
    Failed,
}

/// Cancellable one-shot or periodic deadline on the caller's clock.
///
/// The timer never fires on its own: owners call [`Timer::fire_if_due`] with
/// the current time. Cancelling is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timer {
    armed: Option<Arming>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arming {
    due_at_ms: u64,
    period_ms: Option<u64>,
}

impl Timer {
    /// Arms a one-shot deadline `delay_ms` after `now_ms`, replacing any
    /// previous arming.
    pub fn arm_once(&mut self, now_ms: u64, delay_ms: u64) {
        self.armed = Some(Arming {
            due_at_ms: now_ms.saturating_add(delay_ms),
            period_ms: None,
        });
    }

    /// Arms a periodic deadline whose first firing is one period from now.
    pub fn arm_every(&mut self, now_ms: u64, period_ms: u64) {
        let period_ms = period_ms.max(1);
        self.armed = Some(Arming {
            due_at_ms: now_ms.saturating_add(period_ms),
            period_ms: Some(period_ms),
        });
    }

    /// Disarms the timer. Returns `true` when it was armed.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Returns `true` while a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Next deadline, if armed.
    pub fn due_at_ms(&self) -> Option<u64> {
        self.armed.map(|arming| arming.due_at_ms)
    }

    /// Fires at most once per call.
    ///
    /// One-shot timers disarm after firing. Periodic timers re-arm on the
    /// next period boundary strictly after `now_ms`; missed periods are
    /// coalesced rather than replayed.
    pub fn fire_if_due(&mut self, now_ms: u64) -> bool {
        let Some(arming) = self.armed else {
            return false;
        };
        if now_ms < arming.due_at_ms {
            return false;
        }

        self.armed = arming.period_ms.map(|period_ms| {
            let missed = (now_ms - arming.due_at_ms) / period_ms;
            Arming {
                due_at_ms: arming
                    .due_at_ms
                    .saturating_add(period_ms.saturating_mul(missed + 1)),
                period_ms: Some(period_ms),
            }
        });
        true
    }
}

/// Error type for core validation failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Frame has no pixels or no encoded bytes.
    #[error("frame is empty")]
    EmptyFrame,
}
