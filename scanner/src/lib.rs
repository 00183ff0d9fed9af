//! QR scan-ingestion client for the attendance backend.
//!
//! A continuous decode loop reads identifier payloads from a camera stream,
//! resolves them against the operator's tribe roster, and feeds them to the
//! attendance endpoints one at a time. Payloads decoded while a decision is
//! in flight are dropped, and the camera is released on every exit path.

pub mod camera;
pub mod client;
pub mod payload;
pub mod scan_loop;

pub use camera::{CameraConstraints, CameraError, CameraStream, FacingMode, MediaDevices};
pub use client::{AttendanceApi, HttpAttendanceApi, ProcessorId};
pub use scan_loop::{ScanEvent, Scanner, ScannerState, StartError};
