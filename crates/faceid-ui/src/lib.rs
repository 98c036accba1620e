#![warn(missing_docs)]
//! # faceid-ui
//!
//! ## Purpose
//! Defines the display-facing state of a face-login session.
//!
//! ## Responsibilities
//! - Hold the session status message and the verify affordance.
//! - Project channel lifecycle events into the connection indicator.
//! - Queue user notifications (welcome, redirects, blocking errors).
//!
//! ## Data flow
//! Channel events and session reactions mutate [`SessionView`]; the host
//! renders it and drains notifications with [`SessionView::take_notifications`].
//!
//! ## Ownership and lifetimes
//! `SessionView` owns all strings so reducers never borrow from events.
//!
//! ## Error model
//! This crate holds no fallible operations.
//!
//! ## Security and privacy notes
//! View state excludes credentials and frame data.

use std::collections::VecDeque;

use faceid_auth::LoginNotice;
use faceid_channel::ConnectionEvent;
use faceid_core::ConnectionStatus;

/// Status text while the camera is being opened.
pub const STATUS_ACCESSING_CAMERA: &str = "Accessing camera...";
/// Status text after the camera was refused or missing.
pub const STATUS_CAMERA_DENIED: &str = "Camera access denied. Please allow camera permissions.";
/// Status text after the camera stream ended mid-session.
pub const STATUS_CAMERA_LOST: &str = "Camera stream ended. Please start again.";

/// Label of the connection indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorLabel {
    /// Initial connect in progress.
    Connecting,
    /// Channel open.
    Connected,
    /// Channel open again after automatic reconnection.
    Reconnected,
    /// Channel lost.
    Disconnected,
    /// Connect error or reconnection exhausted.
    Failed,
    /// Automatic reconnect attempt `n`.
    Reconnecting(u32),
}

/// Connection indicator shown continuously by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIndicator {
    /// Current label.
    pub label: IndicatorLabel,
    /// Attempt counter displayed as a suffix while non-zero.
    pub attempts: u32,
    /// Attempt budget shown in the suffix.
    pub max_attempts: u32,
}

impl ConnectionIndicator {
    /// Creates an indicator in the connecting state.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            label: IndicatorLabel::Connecting,
            attempts: 0,
            max_attempts,
        }
    }

    /// Returns `true` when the channel is shown as usable.
    pub fn is_online(&self) -> bool {
        matches!(self.label, IndicatorLabel::Connected | IndicatorLabel::Reconnected)
    }

    /// Coarse status matching the label.
    pub fn status(&self) -> ConnectionStatus {
        match self.label {
            IndicatorLabel::Connecting | IndicatorLabel::Reconnecting(_) => ConnectionStatus::Connecting,
            IndicatorLabel::Connected | IndicatorLabel::Reconnected => ConnectionStatus::Connected,
            IndicatorLabel::Disconnected => ConnectionStatus::Disconnected,
            IndicatorLabel::Failed => ConnectionStatus::Failed,
        }
    }

    /// Applies one lifecycle event. Returns `true` when the indicator changed.
    pub fn apply(&mut self, event: &ConnectionEvent) -> bool {
        let before = self.clone();
        match event {
            ConnectionEvent::Connected => {
                if self.label != IndicatorLabel::Reconnected {
                    self.label = IndicatorLabel::Connected;
                }
                self.attempts = 0;
            }
            ConnectionEvent::Reconnected(_) => {
                self.label = IndicatorLabel::Reconnected;
                self.attempts = 0;
            }
            ConnectionEvent::ConnectError { .. } | ConnectionEvent::ReconnectExhausted => {
                self.label = IndicatorLabel::Failed;
            }
            ConnectionEvent::Disconnected { .. } => self.label = IndicatorLabel::Disconnected,
            ConnectionEvent::ReconnectAttempt(attempt) => {
                self.label = IndicatorLabel::Reconnecting(*attempt);
                self.attempts = *attempt;
            }
            ConnectionEvent::Message(_) => {}
        }
        *self != before
    }

    /// Rendered indicator text, e.g. `Reconnecting... (2) (2/5)`.
    pub fn text(&self) -> String {
        let label = match self.label {
            IndicatorLabel::Connecting => "Connecting...".to_string(),
            IndicatorLabel::Connected => "Connected".to_string(),
            IndicatorLabel::Reconnected => "Reconnected".to_string(),
            IndicatorLabel::Disconnected => "Disconnected".to_string(),
            IndicatorLabel::Failed => "Connection Failed".to_string(),
            IndicatorLabel::Reconnecting(attempt) => format!("Reconnecting... ({attempt})"),
        };
        if self.attempts > 0 {
            format!("{label} ({}/{})", self.attempts, self.max_attempts)
        } else {
            label
        }
    }
}

/// Blocking user notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Login completed.
    Welcome(String),
    /// Credential login must continue with Face ID.
    UseFaceId(String),
    /// Credential login rejected.
    LoginFailed(String),
    /// Blank credential field.
    Validation,
    /// Action needs a connected channel.
    Connectivity(String),
}

impl Notification {
    /// Text shown to the user.
    pub fn message(&self) -> String {
        match self {
            Self::Welcome(username) => format!("Welcome {username}! Login successful!"),
            Self::UseFaceId(username) => {
                format!("User {username} found! Please use Face ID for authentication.")
            }
            Self::LoginFailed(message) => message.clone(),
            Self::Validation => "Please enter both username and password".to_string(),
            Self::Connectivity(detail) => format!("Not connected to server. {detail}"),
        }
    }
}

impl From<LoginNotice> for Notification {
    fn from(notice: LoginNotice) -> Self {
        match notice {
            LoginNotice::Welcome(username) => Self::Welcome(username),
            LoginNotice::UseFaceId(username) => Self::UseFaceId(username),
            LoginNotice::Failed(message) => Self::LoginFailed(message),
        }
    }
}

/// Aggregate view state of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Application version.
    pub version: String,
    /// Session status line; empty when nothing is shown.
    pub status: String,
    /// Connection indicator.
    pub indicator: ConnectionIndicator,
    /// Whether the verify action is offered.
    pub verify_available: bool,
    notifications: VecDeque<Notification>,
}

impl SessionView {
    /// Creates an empty view.
    pub fn new(version: impl Into<String>, max_reconnect_attempts: u32) -> Self {
        Self {
            version: version.into(),
            status: String::new(),
            indicator: ConnectionIndicator::new(max_reconnect_attempts),
            verify_available: false,
            notifications: VecDeque::new(),
        }
    }

    /// Replaces the status line.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Clears the status line.
    pub fn clear_status(&mut self) {
        self.status.clear();
    }

    /// Applies a channel lifecycle event to the indicator.
    pub fn apply_connection_event(&mut self, event: &ConnectionEvent) -> bool {
        self.indicator.apply(event)
    }

    /// Queues a notification.
    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    /// Pending notifications, oldest first.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    /// Drains pending notifications, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }
}
