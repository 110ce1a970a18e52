//! artgate-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based frame capture and the RGB conversions needed to
//! feed the feature extractor.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
