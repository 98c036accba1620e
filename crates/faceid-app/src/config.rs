//! Client configuration and environment overrides.

use faceid_capture::CaptureConfig;
use faceid_channel::{ChannelConfig, validate_endpoint};
use faceid_overlay::{OverlayStyle, StrokeColor};
use faceid_protocol::VerificationPauses;

use crate::AppError;

/// Default detection service endpoint.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
/// Default wait for a `face_verification` reply.
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 10_000;

/// Overrides the service endpoint.
pub const ENV_SERVER_URL: &str = "FACEID_SERVER_URL";
/// Overrides the sampling cadence in milliseconds.
pub const ENV_SAMPLE_INTERVAL_MS: &str = "FACEID_SAMPLE_INTERVAL_MS";
/// Overrides the verify timeout in milliseconds.
pub const ENV_VERIFY_TIMEOUT_MS: &str = "FACEID_VERIFY_TIMEOUT_MS";

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Channel endpoint, timeout and reconnection policy.
    pub channel: ChannelConfig,
    /// Camera and sampling settings.
    pub capture: CaptureConfig,
    /// Overlay stroke geometry.
    pub overlay: OverlayStyle,
    /// Color used for detection boxes.
    pub box_color: StrokeColor,
    /// Post-verification pauses.
    pub pauses: VerificationPauses,
    /// Wait for a verification reply before treating it as failed.
    pub verify_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::new(DEFAULT_SERVER_URL),
            capture: CaptureConfig::default(),
            overlay: OverlayStyle::default(),
            box_color: StrokeColor::GREEN,
            pauses: VerificationPauses::default(),
            verify_timeout_ms: DEFAULT_VERIFY_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    /// Loads defaults overridden by `FACEID_*` environment variables.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidConfig`] for a malformed URL or a
    /// non-positive duration.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults overridden by values from `lookup`.
    ///
    /// # Errors
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_SERVER_URL) {
            config.channel.endpoint = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_SAMPLE_INTERVAL_MS) {
            config.capture.sample_interval_ms = parse_millis(ENV_SAMPLE_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_VERIFY_TIMEOUT_MS) {
            config.verify_timeout_ms = parse_millis(ENV_VERIFY_TIMEOUT_MS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_endpoint(&self.channel.endpoint).map_err(|error| AppError::InvalidConfig(error.to_string()))?;
        CaptureConfig::new(
            self.capture.width,
            self.capture.height,
            self.capture.sample_interval_ms,
            self.capture.jpeg_quality,
        )
        .map_err(|error| AppError::InvalidConfig(error.to_string()))?;
        if self.verify_timeout_ms == 0 {
            return Err(AppError::InvalidConfig("verify timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, AppError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(AppError::InvalidConfig(format!("{key} must be a positive integer, got {raw:?}"))),
    }
}
