#![warn(missing_docs)]
//! # faceid-auth
//!
//! ## Purpose
//! Implements the username/password login path that shares the session
//! channel with the biometric flow.
//!
//! ## Responsibilities
//! - Reject empty credentials locally, before any network call.
//! - Refuse to send when the channel is not connected.
//! - Turn `login_result` outcomes into user-facing notices.
//!
//! ## Data flow
//! UI collects credentials -> [`LoginFlow::submit`] -> `login` event on the
//! channel -> server replies `login_result` -> [`interpret`] ->
//! [`LoginNotice`] shown by the UI.
//!
//! ## Ownership and lifetimes
//! The flow borrows the channel per call and keeps no credential state.
//!
//! ## Error model
//! [`LoginError::Validation`] and [`LoginError::NotConnected`] are local
//! rejections; nothing is sent in either case.
//!
//! ## Security and privacy notes
//! Passwords are never logged or retained after the send.
//!
//! ## Example
//! ```rust
//! use faceid_auth::{interpret, LoginNotice};
//! use faceid_core::LoginOutcome;
//!
//! let notice = interpret(&LoginOutcome::default());
//! assert_eq!(notice, LoginNotice::Failed("Login failed".to_string()));
//! ```

use faceid_channel::ChannelConnection;
use faceid_core::{Credentials, LoginOutcome};
use faceid_protocol::{ProtocolError, send_login};
use thiserror::Error;

/// Failure text used when the server omits its own.
pub const DEFAULT_LOGIN_FAILURE: &str = "Login failed";

/// User-facing result of one login round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginNotice {
    /// Login completed for the named account.
    Welcome(String),
    /// Account exists but must authenticate with Face ID.
    UseFaceId(String),
    /// Login rejected with this explanation.
    Failed(String),
}

/// Interprets a `login_result` outcome.
pub fn interpret(outcome: &LoginOutcome) -> LoginNotice {
    if !outcome.success {
        return LoginNotice::Failed(
            outcome
                .message
                .clone()
                .unwrap_or_else(|| DEFAULT_LOGIN_FAILURE.to_string()),
        );
    }

    let username = outcome.username.clone().unwrap_or_default();
    if outcome.requires_face_id {
        LoginNotice::UseFaceId(username)
    } else {
        LoginNotice::Welcome(username)
    }
}

/// Credential login over the shared channel.
#[derive(Debug, Default)]
pub struct LoginFlow {
    submitted: u64,
}

impl LoginFlow {
    /// Creates a login flow.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and sends one login request.
    ///
    /// # Errors
    /// Returns [`LoginError::Validation`] for an empty field and
    /// [`LoginError::NotConnected`] when the channel is down; neither sends
    /// anything. Send failures surface as [`LoginError::Protocol`].
    pub fn submit(&mut self, channel: &mut ChannelConnection, credentials: &Credentials) -> Result<(), LoginError> {
        if !credentials.is_complete() {
            log::debug!("login rejected locally: empty credential field");
            return Err(LoginError::Validation);
        }
        if !channel.is_connected() {
            log::warn!("login rejected locally: channel not connected");
            return Err(LoginError::NotConnected);
        }

        send_login(channel, credentials)?;
        self.submitted += 1;
        Ok(())
    }

    /// Login requests sent so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }
}

/// Login flow error type.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Username or password is empty.
    #[error("Please enter both username and password")]
    Validation,
    /// Channel is not connected.
    #[error("Not connected to server. Please check if the backend is running.")]
    NotConnected,
    /// Sending the request failed.
    #[error("login request failed: {0}")]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for login validation and outcome notices.

    use faceid_channel::{ChannelConfig, MemoryTransport, TransportEvent};

    use super::*;

    fn connected_channel() -> (ChannelConnection, faceid_channel::TransportProbe) {
        let (transport, probe) = MemoryTransport::new();
        let mut channel = ChannelConnection::new(ChannelConfig::new("http://localhost:5000"), Box::new(transport))
            .expect("channel should build");
        channel.open(0);
        channel.handle_transport_event(TransportEvent::Opened, 10);
        (channel, probe)
    }

    #[test]
    fn empty_password_is_rejected_without_send() {
        let (mut channel, probe) = connected_channel();
        let mut flow = LoginFlow::new();

        let result = flow.submit(&mut channel, &Credentials::new("maitri", ""));

        assert!(matches!(result, Err(LoginError::Validation)));
        assert!(probe.sent().is_empty());
    }

    #[test]
    fn whitespace_password_is_sent_to_the_server() {
        let (mut channel, probe) = connected_channel();
        let mut flow = LoginFlow::new();

        flow.submit(&mut channel, &Credentials::new("maitri", "  "))
            .expect("whitespace is a password");

        assert_eq!(probe.sent().len(), 1);
        assert_eq!(flow.submitted(), 1);
    }

    #[test]
    fn disconnected_channel_is_rejected_without_send() {
        let (transport, probe) = MemoryTransport::new();
        let mut channel = ChannelConnection::new(ChannelConfig::new("http://localhost:5000"), Box::new(transport))
            .expect("channel should build");
        let mut flow = LoginFlow::new();

        let result = flow.submit(&mut channel, &Credentials::new("maitri", "secret"));

        assert!(matches!(result, Err(LoginError::NotConnected)));
        assert!(probe.sent().is_empty());
    }

    #[test]
    fn complete_credentials_are_sent_once() {
        let (mut channel, probe) = connected_channel();
        let mut flow = LoginFlow::new();

        flow.submit(&mut channel, &Credentials::new("maitri", "secret"))
            .expect("submit should work");

        let sent = probe.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with(r#"42["login","#));
        assert_eq!(flow.submitted(), 1);
    }

    #[test]
    fn face_id_accounts_are_redirected() {
        let notice = interpret(&LoginOutcome {
            success: true,
            username: Some("maitri".to_string()),
            requires_face_id: true,
            message: None,
        });
        assert_eq!(notice, LoginNotice::UseFaceId("maitri".to_string()));
    }

    #[test]
    fn server_failure_message_is_kept() {
        let notice = interpret(&LoginOutcome {
            success: false,
            username: None,
            requires_face_id: false,
            message: Some("Invalid username or password".to_string()),
        });
        assert_eq!(notice, LoginNotice::Failed("Invalid username or password".to_string()));
    }
}
