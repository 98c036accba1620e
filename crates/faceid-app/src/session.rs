//! Explicit session state machine.
//!
//! Every legal move is one row of [`transition`]; anything else is rejected
//! with [`SessionError::IllegalTransition`] and leaves the state untouched.

use faceid_core::SessionState;
use thiserror::Error;

/// Input that may move the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    /// Channel open requested while idle.
    ChannelOpening,
    /// Channel reported connected.
    ChannelReady,
    /// Channel connect failed or reconnection gave up.
    ChannelFailed,
    /// Camera acquired and sampling armed.
    CaptureStarted,
    /// Camera refused, missing, or its stream ended.
    CaptureFailed,
    /// Latest detection outcome had at least one box.
    FaceDetected,
    /// Latest detection outcome had no boxes.
    FaceLost,
    /// User asked to verify.
    VerifyRequested,
    /// Server accepted the face.
    VerificationPassed,
    /// Server rejected the face or no verdict arrived in time.
    VerificationRejected,
    /// Post-success pause ran out.
    SuccessPauseElapsed,
    /// Post-failure pause ran out.
    FailurePauseElapsed,
    /// User cancelled.
    Cancel,
}

/// Returns the next state, or `None` when `event` is illegal in `state`.
pub fn transition(state: SessionState, event: SessionEvent) -> Option<SessionState> {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (_, E::Cancel | E::CaptureFailed) => Some(S::Idle),
        (S::Idle, E::ChannelOpening) => Some(S::Connecting),
        (S::Connecting, E::ChannelReady | E::ChannelFailed) => Some(S::Idle),
        (S::Idle, E::CaptureStarted) => Some(S::Scanning),
        (S::Scanning | S::FaceFound, E::FaceDetected) => Some(S::FaceFound),
        (S::Scanning | S::FaceFound, E::FaceLost) => Some(S::Scanning),
        (S::FaceFound, E::VerifyRequested) => Some(S::Verifying),
        (S::Verifying, E::VerificationPassed) => Some(S::VerifiedOk),
        (S::Verifying, E::VerificationRejected) => Some(S::VerifiedFailed),
        (S::VerifiedOk, E::SuccessPauseElapsed) => Some(S::Idle),
        (S::VerifiedFailed, E::FailurePauseElapsed) => Some(S::Scanning),
        _ => None,
    }
}

/// Owner of the current [`SessionState`].
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: SessionState,
    transitions: u64,
}

impl SessionStateMachine {
    /// Creates a machine in `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of applied transitions.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Returns `true` when `event` would be accepted now.
    pub fn accepts(&self, event: SessionEvent) -> bool {
        transition(self.state, event).is_some()
    }

    /// Applies `event`.
    ///
    /// # Errors
    /// Returns [`SessionError::IllegalTransition`] and keeps the current
    /// state when the table has no row for the pair.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, SessionError> {
        let from = self.state;
        let to = transition(from, event).ok_or(SessionError::IllegalTransition { from, event })?;
        if from != to {
            log::info!("session {from:?} -> {to:?} on {event:?}");
        }
        self.state = to;
        self.transitions += 1;
        Ok(to)
    }
}

/// Session state machine error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No transition exists for the pair.
    #[error("illegal session transition from {from:?} on {event:?}")]
    IllegalTransition {
        /// State when the event arrived.
        from: SessionState,
        /// Rejected event.
        event: SessionEvent,
    },
}

#[cfg(test)]
mod tests {
    //! Unit tests for the transition table.

    use super::*;

    const ALL_STATES: [SessionState; 7] = [
        SessionState::Idle,
        SessionState::Connecting,
        SessionState::Scanning,
        SessionState::FaceFound,
        SessionState::Verifying,
        SessionState::VerifiedOk,
        SessionState::VerifiedFailed,
    ];

    #[test]
    fn cancel_reaches_idle_from_every_state() {
        for state in ALL_STATES {
            assert_eq!(transition(state, SessionEvent::Cancel), Some(SessionState::Idle));
        }
    }

    #[test]
    fn verify_is_only_legal_in_face_found() {
        for state in ALL_STATES {
            let expected = (state == SessionState::FaceFound).then_some(SessionState::Verifying);
            assert_eq!(transition(state, SessionEvent::VerifyRequested), expected, "{state:?}");
        }
    }

    #[test]
    fn detection_oscillates_between_scanning_and_face_found() {
        let mut machine = SessionStateMachine::new();
        machine.apply(SessionEvent::CaptureStarted).expect("start should work");
        machine.apply(SessionEvent::FaceDetected).expect("detect should work");
        machine.apply(SessionEvent::FaceLost).expect("lose should work");
        assert_eq!(machine.state(), SessionState::Scanning);
    }

    #[test]
    fn illegal_event_keeps_state() {
        let mut machine = SessionStateMachine::new();
        let error = machine
            .apply(SessionEvent::VerificationPassed)
            .expect_err("idle cannot pass verification");
        assert_eq!(
            error,
            SessionError::IllegalTransition {
                from: SessionState::Idle,
                event: SessionEvent::VerificationPassed,
            }
        );
        assert_eq!(machine.state(), SessionState::Idle);
        assert_eq!(machine.transitions(), 0);
    }

    #[test]
    fn failure_pause_resumes_scanning() {
        assert_eq!(
            transition(SessionState::VerifiedFailed, SessionEvent::FailurePauseElapsed),
            Some(SessionState::Scanning)
        );
        assert_eq!(
            transition(SessionState::VerifiedOk, SessionEvent::SuccessPauseElapsed),
            Some(SessionState::Idle)
        );
    }
}
