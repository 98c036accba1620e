#![warn(missing_docs)]
//! # faceid-capture
//!
//! ## Purpose
//! Owns the camera stream and the periodic frame-sampling task of one
//! biometric session.
//!
//! ## Responsibilities
//! - Define backend-agnostic camera traits.
//! - Rasterize live frames into the fixed 640×480 buffer and JPEG-encode them.
//! - Run the fixed-cadence sampling task with explicit, idempotent
//!   cancellation.
//! - Release the stream tracks exactly once per session.
//! - Expose a deterministic synthetic camera for tests and demos.
//!
//! ## Data flow
//! [`CaptureSession::start`] acquires a [`CameraStream`] -> each due sampling
//! tick in [`CaptureSession::poll`] grabs a frame -> [`encode_frame`] produces
//! a [`faceid_core::Frame`] handed to the protocol layer.
//!
//! ## Ownership and lifetimes
//! A [`CaptureSession`] exclusively owns its stream and its sampling timer.
//! Dropping the session releases the camera.
//!
//! ## Error model
//! Permission refusal and missing devices surface as [`CaptureError::Denied`]
//! / [`CaptureError::NoDevice`]. A stream that ends mid-session releases its
//! tracks before [`CaptureError::StreamEnded`] is returned.
//!
//! ## Security and privacy notes
//! Frames live only for one tick; nothing is written to disk.

use std::sync::{Arc, Mutex};

use faceid_core::{CAPTURE_HEIGHT, CAPTURE_WIDTH, Frame, Timer};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use thiserror::Error;

/// Default sampling cadence.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;

/// Default JPEG quality (the `0.8` of a canvas encoder).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Capture configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Encoded frame width.
    pub width: u32,
    /// Encoded frame height.
    pub height: u32,
    /// Sampling period.
    pub sample_interval_ms: u64,
    /// JPEG quality in `1..=100`.
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl CaptureConfig {
    /// Creates validated capture configuration.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidConfig`] for zero sizes, a zero
    /// interval, or a quality outside `1..=100`.
    pub fn new(width: u32, height: u32, sample_interval_ms: u64, jpeg_quality: u8) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidConfig("frame size must be non-zero".to_string()));
        }
        if sample_interval_ms == 0 {
            return Err(CaptureError::InvalidConfig(
                "sample interval must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&jpeg_quality) {
            return Err(CaptureError::InvalidConfig(format!(
                "jpeg quality {jpeg_quality} outside 1..=100"
            )));
        }

        Ok(Self {
            width,
            height,
            sample_interval_ms,
            jpeg_quality,
        })
    }

    /// Tick times of the first `count` samples of a session started at
    /// `start_ms`.
    pub fn sampling_schedule(&self, start_ms: u64, count: usize) -> Vec<u64> {
        (1..=count as u64)
            .map(|index| start_ms.saturating_add(self.sample_interval_ms.saturating_mul(index)))
            .collect()
    }

    /// Stream constraints derived from this configuration.
    pub fn stream_request(&self) -> StreamRequest {
        StreamRequest {
            width: self.width,
            height: self.height,
        }
    }
}

/// Constraints passed to the camera when acquiring a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    /// Preferred width.
    pub width: u32,
    /// Preferred height.
    pub height: u32,
}

/// Camera access provider.
pub trait CameraBackend {
    /// Requests exclusive access to the camera.
    ///
    /// # Errors
    /// Returns [`CaptureError::Denied`] when permission is refused and
    /// [`CaptureError::NoDevice`] when no camera is present.
    fn open(&mut self, request: StreamRequest) -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// Live camera stream.
pub trait CameraStream {
    /// Native resolution the device actually delivers.
    fn native_size(&self) -> (u32, u32);

    /// Grabs the current frame.
    ///
    /// # Errors
    /// Returns [`CaptureError::StreamEnded`] once the stream is gone.
    fn grab(&mut self) -> Result<RgbImage, CaptureError>;

    /// Stops every track of the stream.
    fn stop_tracks(&mut self);
}

/// Rasterizes `image` into the configured buffer size and JPEG-encodes it.
///
/// # Errors
/// Returns [`CaptureError::Encode`] when the encoder fails.
pub fn encode_frame(image: &RgbImage, config: &CaptureConfig, captured_at_ms: u64) -> Result<Frame, CaptureError> {
    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, config.jpeg_quality);
        let encoded = if image.dimensions() == (config.width, config.height) {
            encoder.encode_image(image)
        } else {
            let resized =
                image::imageops::resize(image, config.width, config.height, FilterType::Triangle);
            encoder.encode_image(&resized)
        };
        encoded.map_err(|error| CaptureError::Encode(error.to_string()))?;
    }

    Frame::new(config.width, config.height, captured_at_ms, jpeg).map_err(|error| CaptureError::Encode(error.to_string()))
}

/// Camera stream plus sampling task for one biometric session.
pub struct CaptureSession {
    config: CaptureConfig,
    stream: Option<Box<dyn CameraStream>>,
    sampler: Timer,
}

impl CaptureSession {
    /// Acquires the camera and arms the sampling task.
    ///
    /// # Errors
    /// Propagates backend acquisition errors; no task is armed in that case.
    pub fn start(backend: &mut dyn CameraBackend, config: CaptureConfig, now_ms: u64) -> Result<Self, CaptureError> {
        let stream = backend.open(config.stream_request())?;
        let (native_width, native_height) = stream.native_size();
        log::info!("capture started: native {native_width}x{native_height}");

        let mut sampler = Timer::default();
        sampler.arm_every(now_ms, config.sample_interval_ms);

        Ok(Self {
            config,
            stream: Some(stream),
            sampler,
        })
    }

    /// Disarms the sampling task without releasing the camera. Returns `true`
    /// when it was armed.
    pub fn pause_sampling(&mut self) -> bool {
        self.sampler.cancel()
    }

    /// Re-arms the sampling task if the camera is live and the task is idle.
    pub fn resume_sampling(&mut self, now_ms: u64) {
        if self.is_live() && !self.sampler.is_armed() {
            self.sampler.arm_every(now_ms, self.config.sample_interval_ms);
        }
    }

    /// Runs a due sampling tick.
    ///
    /// Returns `Ok(None)` when no tick is due, or when the tick finds
    /// sampling disabled; a disabled tick is a no-op.
    ///
    /// # Errors
    /// Propagates capture and encode failures. A stream that ended has
    /// already been released when this returns.
    pub fn poll(&mut self, now_ms: u64, sampling_enabled: bool) -> Result<Option<Frame>, CaptureError> {
        if !self.sampler.fire_if_due(now_ms) {
            return Ok(None);
        }
        if !sampling_enabled || !self.is_live() {
            log::trace!("sampling tick skipped at {now_ms}");
            return Ok(None);
        }
        self.capture(now_ms).map(Some)
    }

    /// Captures and encodes the current frame immediately.
    ///
    /// # Errors
    /// Returns [`CaptureError::StreamEnded`] when no live stream remains.
    pub fn capture(&mut self, now_ms: u64) -> Result<Frame, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::StreamEnded)?;
        let image = match stream.grab() {
            Ok(image) => image,
            Err(error) => {
                log::warn!("capture stream failed: {error}");
                self.stop();
                return Err(error);
            }
        };

        let frame = encode_frame(&image, &self.config, now_ms)?;
        log::debug!("captured frame {} ({} bytes)", frame.fingerprint(), frame.jpeg.len());
        Ok(frame)
    }

    /// Cancels sampling and releases the camera. Idempotent: returns `true`
    /// only on the call that actually released the tracks.
    pub fn stop(&mut self) -> bool {
        self.sampler.cancel();
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop_tracks();
                log::info!("capture stopped; camera released");
                true
            }
            None => false,
        }
    }

    /// Returns `true` while the camera stream is held.
    pub fn is_live(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns `true` while the sampling task is armed.
    pub fn is_sampling(&self) -> bool {
        self.sampler.is_armed()
    }

    /// Native stream resolution, while live.
    pub fn native_size(&self) -> Option<(u32, u32)> {
        self.stream.as_ref().map(|stream| stream.native_size())
    }

    /// Active configuration.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Default)]
struct CameraLog {
    opened: u32,
    released: u32,
    grabs: u64,
    deny_permission: bool,
    device_missing: bool,
    end_after_grabs: Option<u64>,
}

/// Deterministic synthetic camera for tests and demos.
#[derive(Debug)]
pub struct SyntheticCamera {
    native: (u32, u32),
    log: Arc<Mutex<CameraLog>>,
}

/// Inspection and fault-injection handle for a [`SyntheticCamera`].
#[derive(Debug, Clone)]
pub struct CameraProbe {
    log: Arc<Mutex<CameraLog>>,
}

impl SyntheticCamera {
    /// Creates a 640×480 camera plus its probe.
    pub fn new() -> (Self, CameraProbe) {
        Self::with_native_size(CAPTURE_WIDTH, CAPTURE_HEIGHT)
    }

    /// Creates a camera delivering a custom native size.
    pub fn with_native_size(width: u32, height: u32) -> (Self, CameraProbe) {
        let log = Arc::new(Mutex::new(CameraLog::default()));
        (
            Self {
                native: (width.max(1), height.max(1)),
                log: Arc::clone(&log),
            },
            CameraProbe { log },
        )
    }
}

impl CameraBackend for SyntheticCamera {
    fn open(&mut self, _request: StreamRequest) -> Result<Box<dyn CameraStream>, CaptureError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| CaptureError::Backend("synthetic camera lock poisoned".to_string()))?;
        if log.deny_permission {
            return Err(CaptureError::Denied("permission denied by user".to_string()));
        }
        if log.device_missing {
            return Err(CaptureError::NoDevice);
        }
        log.opened += 1;

        Ok(Box::new(SyntheticStream {
            native: self.native,
            log: Arc::clone(&self.log),
            stopped: false,
        }))
    }
}

struct SyntheticStream {
    native: (u32, u32),
    log: Arc<Mutex<CameraLog>>,
    stopped: bool,
}

impl CameraStream for SyntheticStream {
    fn native_size(&self) -> (u32, u32) {
        self.native
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        if self.stopped {
            return Err(CaptureError::StreamEnded);
        }
        let mut log = self
            .log
            .lock()
            .map_err(|_| CaptureError::Backend("synthetic camera lock poisoned".to_string()))?;
        if log.end_after_grabs.is_some_and(|limit| log.grabs >= limit) {
            return Err(CaptureError::StreamEnded);
        }
        log.grabs += 1;

        let shade = (log.grabs % 255) as u8;
        let (width, height) = self.native;
        Ok(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, shade])
        }))
    }

    fn stop_tracks(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Ok(mut log) = self.log.lock() {
            log.released += 1;
        }
    }
}

impl CameraProbe {
    /// Streams opened so far.
    pub fn opened(&self) -> u32 {
        self.read(|log| log.opened)
    }

    /// Streams whose tracks were released.
    pub fn released(&self) -> u32 {
        self.read(|log| log.released)
    }

    /// Frames grabbed so far.
    pub fn grabs(&self) -> u64 {
        self.read(|log| log.grabs)
    }

    /// Makes later `open` calls fail with a permission error.
    pub fn deny_permission(&self, deny: bool) {
        self.write(|log| log.deny_permission = deny);
    }

    /// Makes later `open` calls fail as if no camera were attached.
    pub fn remove_device(&self, missing: bool) {
        self.write(|log| log.device_missing = missing);
    }

    /// Ends every stream once `grabs` frames have been delivered in total.
    pub fn end_stream_after(&self, grabs: u64) {
        self.write(|log| log.end_after_grabs = Some(grabs));
    }

    fn read<T: Default>(&self, f: impl FnOnce(&CameraLog) -> T) -> T {
        self.log.lock().map(|log| f(&log)).unwrap_or_default()
    }

    fn write(&self, f: impl FnOnce(&mut CameraLog)) {
        if let Ok(mut log) = self.log.lock() {
            f(&mut log);
        }
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Camera permission refused.
    #[error("camera access denied: {0}")]
    Denied(String),
    /// No camera device available.
    #[error("no camera device available")]
    NoDevice,
    /// The stream ended or was already released.
    #[error("camera stream ended")]
    StreamEnded,
    /// Configuration is unusable.
    #[error("invalid capture config: {0}")]
    InvalidConfig(String),
    /// Frame encoding failed.
    #[error("frame encode failure: {0}")]
    Encode(String),
    /// Backend runtime failure.
    #[error("camera backend failure: {0}")]
    Backend(String),
}

impl CaptureError {
    /// Returns `true` for the errors the session reports as a denied camera.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::NoDevice)
    }
}
