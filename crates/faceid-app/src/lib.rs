#![warn(missing_docs)]
//! # faceid-app
//!
//! ## Purpose
//! Orchestrates channel, capture, detection protocol, overlay, login and view
//! state into one face-login client.
//!
//! ## Responsibilities
//! - Own the explicit session state machine and its transition table.
//! - Keep frame sampling active exactly while the session scans, the camera
//!   is live and the channel is connected.
//! - Schedule the post-verification pauses and the verify timeout as
//!   cancellable continuations.
//! - Load client configuration and expose the build version.
//!
//! ## Data flow
//! Host transport events -> [`FaceIdClient::on_transport_event`] -> channel
//! subscription -> protocol decode -> state machine -> overlay/view.
//! Host clock -> [`FaceIdClient::advance`] -> sampling tick -> `detect_face`.
//!
//! ## Ownership and lifetimes
//! [`FaceIdClient`] owns exactly one channel and at most one capture session;
//! the protocol and login flow borrow the channel per call.
//!
//! ## Error model
//! User-facing failures are [`AppError::CaptureDenied`],
//! [`AppError::Connectivity`] and [`AppError::Validation`]; each is also
//! surfaced through the view. None is fatal to the host.
//!
//! ## Security and privacy notes
//! Frames are logged by fingerprint only. Credentials pass through without
//! being stored or logged.
//!
//! ## Example
//! ```rust
//! use faceid_app::session::{SessionEvent, transition};
//! use faceid_core::SessionState;
//!
//! assert_eq!(
//!     transition(SessionState::Idle, SessionEvent::CaptureStarted),
//!     Some(SessionState::Scanning)
//! );
//! ```

pub mod client;
pub mod config;
pub mod session;

use faceid_capture::CaptureError;
use faceid_channel::ChannelError;
use faceid_protocol::ProtocolError;
use thiserror::Error;

pub use client::FaceIdClient;
pub use config::ClientConfig;
pub use session::{SessionError, SessionEvent, SessionStateMachine};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("FACEID_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration value rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Camera permission refused or no device available.
    #[error("camera unavailable: {0}")]
    CaptureDenied(#[source] CaptureError),
    /// Camera stream failed during a session.
    #[error("capture error: {0}")]
    Capture(#[source] CaptureError),
    /// Action needs a connected channel.
    #[error("not connected to server: {0}")]
    Connectivity(String),
    /// Blank credential field.
    #[error("please enter both username and password")]
    Validation,
    /// Requested action is not legal in the current session state.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    /// Outbound message could not be sent.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// Channel construction failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
