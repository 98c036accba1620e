//! Face-login client orchestrator.
//!
//! [`FaceIdClient`] is driven entirely by its host: transport notifications
//! go through [`FaceIdClient::on_transport_event`], the clock through
//! [`FaceIdClient::advance`], and user actions through `start`, `verify`,
//! `cancel` and `submit_login`. Nothing runs in the background.

use crossbeam_channel::Receiver;
use faceid_auth::{LoginError, LoginFlow, interpret};
use faceid_capture::{CameraBackend, CaptureError, CaptureSession};
use faceid_channel::{ChannelConnection, ChannelTransport, ConnectionEvent, TransportEvent};
use faceid_core::{Credentials, DetectionOutcome, SessionState, Timer, VerificationOutcome};
use faceid_overlay::{OverlayRenderer, OverlaySurface};
use faceid_protocol::{
    DetectionProtocol, InboundMessage, OverlayAction, STATUS_VERIFYING, decode_inbound, react_to_detection,
    react_to_verification,
};
use faceid_ui::{
    Notification, STATUS_ACCESSING_CAMERA, STATUS_CAMERA_DENIED, STATUS_CAMERA_LOST, SessionView,
};

use crate::session::{SessionEvent, SessionStateMachine};
use crate::{AppError, ClientConfig, app_version};

/// Connectivity hint for actions started without a channel.
pub const HINT_BACKEND_DOWN: &str = "Please check if the backend is running.";
/// Connectivity hint for a verify attempted without a channel.
pub const HINT_CANNOT_VERIFY: &str = "Cannot verify face.";

const VERIFY_TIMEOUT_MESSAGE: &str = "no verification reply before the deadline";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Continuation {
    Welcome(String),
    ResumeScanning,
}

/// One face-login client: channel, camera, overlay and view state.
pub struct FaceIdClient<S> {
    config: ClientConfig,
    channel: ChannelConnection,
    events: Receiver<ConnectionEvent>,
    camera: Box<dyn CameraBackend>,
    capture: Option<CaptureSession>,
    overlay: OverlayRenderer<S>,
    protocol: DetectionProtocol,
    login: LoginFlow,
    machine: SessionStateMachine,
    view: SessionView,
    pause: Timer,
    continuation: Option<Continuation>,
    verify_deadline: Timer,
}

impl<S: OverlaySurface> FaceIdClient<S> {
    /// Builds a client around host-provided transport, camera and surface.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidConfig`] or [`AppError::Channel`] when the
    /// configuration is unusable.
    pub fn new(
        config: ClientConfig,
        transport: Box<dyn ChannelTransport>,
        camera: Box<dyn CameraBackend>,
        surface: S,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let mut channel = ChannelConnection::new(config.channel.clone(), transport)?;
        let events = channel.subscribe();
        let view = SessionView::new(app_version(), config.channel.reconnect.max_attempts);
        let overlay = OverlayRenderer::with_style(surface, config.overlay);

        Ok(Self {
            config,
            channel,
            events,
            camera,
            capture: None,
            overlay,
            protocol: DetectionProtocol::new(),
            login: LoginFlow::new(),
            machine: SessionStateMachine::new(),
            view,
            pause: Timer::default(),
            continuation: None,
            verify_deadline: Timer::default(),
        })
    }

    /// Opens the channel; an idle session moves to `Connecting` until the
    /// first connect succeeds or fails.
    pub fn connect(&mut self, now_ms: u64) {
        if !self.channel.is_connected() && self.machine.accepts(SessionEvent::ChannelOpening) {
            self.apply(SessionEvent::ChannelOpening);
        }
        self.channel.open(now_ms);
        self.pump(now_ms);
    }

    /// Closes the channel and tears the session down.
    pub fn disconnect(&mut self, now_ms: u64) {
        self.cancel();
        self.channel.close();
        self.pump(now_ms);
    }

    /// Feeds one host transport notification.
    pub fn on_transport_event(&mut self, event: TransportEvent, now_ms: u64) {
        self.channel.handle_transport_event(event, now_ms);
        self.pump(now_ms);
    }

    /// Runs everything due at `now_ms`: channel timers, pending
    /// continuations, the verify deadline and the sampling tick.
    pub fn advance(&mut self, now_ms: u64) {
        self.channel.poll(now_ms);
        self.pump(now_ms);

        if self.pause.fire_if_due(now_ms) {
            self.run_continuation(now_ms);
        }
        if self.verify_deadline.fire_if_due(now_ms) {
            self.on_verify_timeout(now_ms);
        }
        self.sample(now_ms);
    }

    /// Starts a biometric session: acquires the camera and begins sampling.
    ///
    /// # Errors
    /// - [`AppError::Session`] when a session is already running.
    /// - [`AppError::Connectivity`] when the channel is down.
    /// - [`AppError::CaptureDenied`] when the camera is refused or missing;
    ///   the session stays `Idle` with no sampling task.
    pub fn start(&mut self, now_ms: u64) -> Result<(), AppError> {
        if !self.machine.accepts(SessionEvent::CaptureStarted) {
            return Err(crate::SessionError::IllegalTransition {
                from: self.state(),
                event: SessionEvent::CaptureStarted,
            }
            .into());
        }
        if !self.channel.is_connected() {
            self.view.notify(Notification::Connectivity(HINT_BACKEND_DOWN.to_string()));
            return Err(AppError::Connectivity(HINT_BACKEND_DOWN.to_string()));
        }

        self.view.set_status(STATUS_ACCESSING_CAMERA);
        match CaptureSession::start(self.camera.as_mut(), self.config.capture, now_ms) {
            Ok(capture) => {
                self.capture = Some(capture);
                self.apply(SessionEvent::CaptureStarted);
                self.view.set_status(faceid_protocol::STATUS_SEARCHING);
                self.sync_sampling(now_ms);
                Ok(())
            }
            Err(error) => {
                if error.is_denial() {
                    log::warn!("camera unavailable: {error}");
                } else {
                    log::error!("camera backend failed: {error}");
                }
                self.view.set_status(STATUS_CAMERA_DENIED);
                self.apply(SessionEvent::CaptureFailed);
                Err(AppError::CaptureDenied(error))
            }
        }
    }

    /// Sends `verify_face` with the current frame.
    ///
    /// Returns `Ok(false)` without sending unless the session is in
    /// `FaceFound`.
    ///
    /// # Errors
    /// - [`AppError::Connectivity`] when the channel is down.
    /// - [`AppError::Capture`] when the frame cannot be captured.
    /// - [`AppError::Protocol`] when the send fails.
    pub fn verify(&mut self, now_ms: u64) -> Result<bool, AppError> {
        if !self.state().allows_verify() {
            log::debug!("verify ignored in {:?}", self.state());
            return Ok(false);
        }
        if !self.channel.is_connected() {
            self.view.notify(Notification::Connectivity(HINT_CANNOT_VERIFY.to_string()));
            return Err(AppError::Connectivity(HINT_CANNOT_VERIFY.to_string()));
        }
        let Some(capture) = self.capture.as_mut() else {
            return Ok(false);
        };

        let frame = match capture.capture(now_ms) {
            Ok(frame) => frame,
            Err(error) => {
                self.on_capture_error(&error);
                return Err(AppError::Capture(error));
            }
        };
        self.protocol.send_verify(&mut self.channel, &frame)?;

        self.apply(SessionEvent::VerifyRequested);
        self.view.verify_available = false;
        self.view.set_status(STATUS_VERIFYING);
        self.verify_deadline.arm_once(now_ms, self.config.verify_timeout_ms);
        self.sync_sampling(now_ms);
        Ok(true)
    }

    /// Stops sampling, releases the camera, clears overlay and status, and
    /// returns to `Idle`. Safe in any state; returns `false` when there was
    /// nothing to tear down.
    pub fn cancel(&mut self) -> bool {
        let released = self.release_session();
        self.view.clear_status();
        let was_active = self.state() != SessionState::Idle;
        if was_active {
            self.apply(SessionEvent::Cancel);
        }
        released || was_active
    }

    /// Submits a credential login over the shared channel.
    ///
    /// # Errors
    /// [`AppError::Validation`] and [`AppError::Connectivity`] are local
    /// rejections, also queued as notifications; nothing is sent.
    pub fn submit_login(&mut self, credentials: &Credentials) -> Result<(), AppError> {
        match self.login.submit(&mut self.channel, credentials) {
            Ok(()) => Ok(()),
            Err(LoginError::Validation) => {
                self.view.notify(Notification::Validation);
                Err(AppError::Validation)
            }
            Err(LoginError::NotConnected) => {
                self.view.notify(Notification::Connectivity(HINT_BACKEND_DOWN.to_string()));
                Err(AppError::Connectivity(HINT_BACKEND_DOWN.to_string()))
            }
            Err(LoginError::Protocol(error)) => Err(error.into()),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// View state for rendering.
    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// Drains queued notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.view.take_notifications()
    }

    /// Channel handle.
    pub fn channel(&self) -> &ChannelConnection {
        &self.channel
    }

    /// Overlay renderer.
    pub fn overlay(&self) -> &OverlayRenderer<S> {
        &self.overlay
    }

    /// Overlay surface, e.g. to report a video layout change.
    pub fn overlay_surface_mut(&mut self) -> &mut S {
        self.overlay.surface_mut()
    }

    /// Outbound request counters.
    pub fn protocol(&self) -> &DetectionProtocol {
        &self.protocol
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns `true` while the sampling task is armed.
    pub fn sampling_active(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureSession::is_sampling)
    }

    /// Returns `true` while the camera is held.
    pub fn camera_live(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureSession::is_live)
    }

    /// Returns `true` while a post-verification pause is pending.
    pub fn pause_pending(&self) -> bool {
        self.pause.is_armed()
    }

    fn sampling_enabled(&self) -> bool {
        self.state().samples_frames() && self.channel.is_connected() && self.camera_live()
    }

    fn apply(&mut self, event: SessionEvent) {
        if let Err(error) = self.machine.apply(event) {
            log::debug!("{error}");
        }
    }

    fn pump(&mut self, now_ms: u64) {
        while let Ok(event) = self.events.try_recv() {
            self.on_connection_event(event, now_ms);
        }
        self.sync_sampling(now_ms);
    }

    fn sync_sampling(&mut self, now_ms: u64) {
        let enabled = self.sampling_enabled();
        let Some(capture) = self.capture.as_mut() else {
            return;
        };
        if enabled {
            capture.resume_sampling(now_ms);
        } else if capture.pause_sampling() {
            log::debug!("sampling paused");
        }
    }

    fn sample(&mut self, now_ms: u64) {
        let enabled = self.sampling_enabled();
        let Some(capture) = self.capture.as_mut() else {
            return;
        };
        match capture.poll(now_ms, enabled) {
            Ok(Some(frame)) => {
                if let Err(error) = self.protocol.send_detect(&mut self.channel, &frame) {
                    log::warn!("detect request dropped: {error}");
                }
            }
            Ok(None) => {}
            Err(error) => self.on_capture_error(&error),
        }
    }

    fn on_connection_event(&mut self, event: ConnectionEvent, now_ms: u64) {
        self.view.apply_connection_event(&event);
        let connecting = self.state() == SessionState::Connecting;
        match event {
            ConnectionEvent::Connected if connecting => self.apply(SessionEvent::ChannelReady),
            ConnectionEvent::ConnectError { .. } | ConnectionEvent::ReconnectExhausted if connecting => {
                self.apply(SessionEvent::ChannelFailed);
            }
            ConnectionEvent::Message(frame) => self.on_inbound(&frame, now_ms),
            _ => {}
        }
    }

    fn on_inbound(&mut self, frame: &str, now_ms: u64) {
        let message = match decode_inbound(frame) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(error) => {
                log::warn!("inbound frame dropped: {error}");
                return;
            }
        };

        match message {
            InboundMessage::Detection(outcome) => self.on_detection(&outcome),
            InboundMessage::Verification(outcome) => self.on_verification(&outcome, now_ms),
            InboundMessage::Login(outcome) => {
                let notice = interpret(&outcome);
                log::info!("login result: {notice:?}");
                self.view.notify(notice.into());
            }
            InboundMessage::Status(greeting) => log::info!("server status: {greeting}"),
            InboundMessage::Unknown(event) => log::debug!("unhandled server event {event}"),
        }
    }

    fn on_detection(&mut self, outcome: &DetectionOutcome) {
        if !self.state().samples_frames() {
            log::debug!("stale detection ignored in {:?}", self.state());
            return;
        }

        let reaction = react_to_detection(outcome);
        let event = if reaction.next_state == SessionState::FaceFound {
            SessionEvent::FaceDetected
        } else {
            SessionEvent::FaceLost
        };
        self.apply(event);

        match &reaction.overlay {
            OverlayAction::Draw(boxes) => {
                let drawn = self.overlay.draw(boxes, self.config.box_color);
                log::debug!("overlay shows {} box(es)", drawn.len());
            }
            OverlayAction::Clear => self.overlay.clear(),
        }
        self.view.set_status(reaction.status);
        self.view.verify_available = self.state().allows_verify();
    }

    fn on_verification(&mut self, outcome: &VerificationOutcome, now_ms: u64) {
        if self.state() != SessionState::Verifying {
            log::debug!("stale verification ignored in {:?}", self.state());
            return;
        }
        self.verify_deadline.cancel();
        log::info!("verification success={} message={:?}", outcome.success, outcome.message);

        let reaction = react_to_verification(outcome, self.config.pauses);
        let (event, continuation) = if reaction.next_state == SessionState::VerifiedOk {
            (
                SessionEvent::VerificationPassed,
                Continuation::Welcome(reaction.username.clone().unwrap_or_default()),
            )
        } else {
            (SessionEvent::VerificationRejected, Continuation::ResumeScanning)
        };
        self.apply(event);
        self.view.set_status(reaction.status);
        self.pause.arm_once(now_ms, reaction.pause_ms);
        self.continuation = Some(continuation);
    }

    fn on_verify_timeout(&mut self, now_ms: u64) {
        if self.state() != SessionState::Verifying {
            return;
        }
        log::warn!("verification timed out after {} ms", self.config.verify_timeout_ms);
        let outcome = VerificationOutcome {
            success: false,
            username: None,
            message: VERIFY_TIMEOUT_MESSAGE.to_string(),
        };
        self.on_verification(&outcome, now_ms);
    }

    fn run_continuation(&mut self, now_ms: u64) {
        let state = self.state();
        match self.continuation.take() {
            Some(Continuation::Welcome(username)) if state == SessionState::VerifiedOk => {
                self.release_session();
                self.view.clear_status();
                self.apply(SessionEvent::SuccessPauseElapsed);
                self.view.notify(Notification::Welcome(username));
            }
            Some(Continuation::ResumeScanning) if state == SessionState::VerifiedFailed => {
                self.view.clear_status();
                self.overlay.clear();
                self.apply(SessionEvent::FailurePauseElapsed);
                self.sync_sampling(now_ms);
            }
            Some(stale) => log::debug!("continuation {stale:?} dropped in {state:?}"),
            None => {}
        }
    }

    fn on_capture_error(&mut self, error: &CaptureError) {
        if self.camera_live() {
            log::warn!("frame dropped: {error}");
            return;
        }
        log::warn!("camera stream lost: {error}");
        self.release_session();
        self.view.set_status(STATUS_CAMERA_LOST);
        self.apply(SessionEvent::CaptureFailed);
    }

    fn release_session(&mut self) -> bool {
        self.pause.cancel();
        self.continuation = None;
        self.verify_deadline.cancel();
        self.overlay.clear();
        self.view.verify_available = false;
        self.capture.take().is_some_and(|mut capture| capture.stop())
    }
}
