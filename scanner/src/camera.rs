//! Camera acquisition and the decoded-frame stream.
//!
//! Acquisition walks a ladder of capability requests from most to least
//! specific (rear camera first, bare video last) and reports the last
//! failure, categorized for operator messaging, when nothing opens.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Categorized camera failures, each carrying its operator-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera permission denied. Please allow camera access and try again.")]
    PermissionDenied,
    #[error("No camera found on this device.")]
    NoDeviceFound,
    #[error("Camera is not supported on this device.")]
    DeviceUnsupported,
    #[error("Camera is already in use by another application.")]
    DeviceBusy,
    #[error("Camera doesn't support the requested settings.")]
    ConstraintsUnsatisfiable,
    #[error("Unknown camera error: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera, no fallback within the request.
    ExactEnvironment,
    /// Rear camera preferred.
    Environment,
    /// Front camera preferred.
    User,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
}

impl CameraConstraints {
    fn with_resolution(facing: FacingMode) -> Self {
        Self {
            facing,
            ideal_width: Some(640),
            ideal_height: Some(480),
        }
    }

    fn bare() -> Self {
        Self {
            facing: FacingMode::Any,
            ideal_width: None,
            ideal_height: None,
        }
    }
}

/// Capability requests in the order they are attempted.
pub fn constraint_ladder() -> [CameraConstraints; 5] {
    [
        CameraConstraints::with_resolution(FacingMode::ExactEnvironment),
        CameraConstraints::with_resolution(FacingMode::Environment),
        CameraConstraints::with_resolution(FacingMode::User),
        CameraConstraints::with_resolution(FacingMode::Any),
        CameraConstraints::bare(),
    ]
}

/// A camera capability source: the real device stack in production, scripted
/// fakes in tests.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open(&self, constraints: &CameraConstraints) -> Result<CameraStream, CameraError>;
}

/// An open camera delivering decoded QR payloads.
///
/// Dropping the stream releases the underlying device; the loop relies on
/// this to guarantee release on every exit path, including mid-callback
/// teardown.
pub struct CameraStream {
    frames: mpsc::Receiver<String>,
    _release: ReleaseGuard,
}

struct ReleaseGuard(Option<Box<dyn FnOnce() + Send>>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream").finish_non_exhaustive()
    }
}

impl CameraStream {
    pub fn new(frames: mpsc::Receiver<String>, on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            frames,
            _release: ReleaseGuard(Some(Box::new(on_release))),
        }
    }

    /// Waits for the next decoded payload; `None` once the device is gone.
    pub async fn next_payload(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Takes a payload only if one is already buffered.
    pub fn try_next_payload(&mut self) -> Option<String> {
        self.frames.try_recv().ok()
    }
}

/// Walks the constraint ladder and returns the first stream that opens, or
/// the last categorized error when every attempt fails.
pub async fn acquire<D>(devices: &D) -> Result<CameraStream, CameraError>
where
    D: MediaDevices + ?Sized,
{
    let mut last_err = CameraError::NoDeviceFound;
    for constraints in constraint_ladder() {
        match devices.open(&constraints).await {
            Ok(stream) => {
                tracing::debug!(?constraints, "camera acquired");
                return Ok(stream);
            }
            Err(err) => {
                tracing::debug!(?constraints, error = %err, "camera constraints failed");
                last_err = err;
            }
        }
    }
    Err(last_err)
}
