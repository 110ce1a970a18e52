//! V4L2 camera capture via the `v4l` crate.
//!
//! One frame per capture call, no retry loops. The three open-time
//! failures the user can act on — permission denied, no device, device
//! busy — get distinct error variants and messages.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const EACCES: i32 = 13;
const EBUSY: i32 = 16;
const ENOENT: i32 = 2;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera permission denied: {0} — allow access or check device group membership")]
    PermissionDenied(String),
    #[error("no camera found: {0}")]
    DeviceNotFound(String),
    #[error("camera already in use: {0}")]
    DeviceBusy(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, converted to RGB).
    Yuyv,
    /// Packed RGB24 (3 bytes/pixel, passed through).
    Rgb24,
}

/// V4L2 camera device handle.
///
/// Dropping the handle releases the device — acquisition is scoped and
/// release happens on every exit path.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("device_path", &self.device_path)
            .field("fourcc", &self.fourcc)
            .field("pixel_format", &self.pixel_format)
            .finish_non_exhaustive()
    }
}

/// Map an open-time I/O error onto the user-actionable taxonomy.
fn classify_open_error(err: &std::io::Error, path: &str) -> CameraError {
    match err.raw_os_error() {
        Some(EACCES) => CameraError::PermissionDenied(path.to_string()),
        Some(EBUSY) => CameraError::DeviceBusy(path.to_string()),
        Some(ENOENT) => CameraError::DeviceNotFound(path.to_string()),
        _ => match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                CameraError::PermissionDenied(path.to_string())
            }
            std::io::ErrorKind::NotFound => CameraError::DeviceNotFound(path.to_string()),
            _ => CameraError::CaptureFailed(format!("{path}: {err}")),
        },
    }
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device =
            Device::with_path(device_path).map_err(|e| classify_open_error(&e, device_path))?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        // Request YUYV at 640x480; the frame is downscaled to the
        // extractor input size after capture, so any resolution at or
        // above 224x224 works.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = 640;
        fmt.height = 480;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"RGB3") {
            PixelFormat::Rgb24
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV or RGB3)"
            )));
        };

        if negotiated.width < 224 || negotiated.height < 224 {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "negotiated resolution {}x{} below the 224x224 extractor minimum",
                negotiated.width, negotiated.height
            )));
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
        })
    }

    /// Capture a single RGB frame. One suspend point, one resumption;
    /// the caller decides whether to retry.
    pub fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let rgb = self.buf_to_rgb(buf)?;

        Ok(Frame {
            data: rgb,
            width: self.width,
            height: self.height,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }

    /// Discard `count` frames so auto-exposure settles before real scans.
    pub fn warm_up(&self, count: usize) {
        if count == 0 {
            return;
        }
        tracing::info!(count, "discarding warmup frames");
        for _ in 0..count {
            let _ = self.capture_frame();
        }
    }

    /// Convert a raw buffer to packed RGB24 based on the negotiated format.
    fn buf_to_rgb(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let pixels = (self.width * self.height) as usize;

        match self.pixel_format {
            PixelFormat::Rgb24 => {
                let expected = pixels * 3;
                if buf.len() < expected {
                    return Err(CameraError::CaptureFailed(format!(
                        "RGB3 buffer too short: expected {expected}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..expected].to_vec())
            }
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}"))),
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_permission_denied() {
        let err = std::io::Error::from_raw_os_error(EACCES);
        let classified = classify_open_error(&err, "/dev/video0");
        assert!(matches!(classified, CameraError::PermissionDenied(_)));
        assert!(classified.to_string().contains("permission denied"));
    }

    #[test]
    fn test_classify_not_found() {
        let err = std::io::Error::from_raw_os_error(ENOENT);
        let classified = classify_open_error(&err, "/dev/video9");
        assert!(matches!(classified, CameraError::DeviceNotFound(_)));
        assert!(classified.to_string().contains("no camera found"));
    }

    #[test]
    fn test_classify_busy() {
        let err = std::io::Error::from_raw_os_error(EBUSY);
        let classified = classify_open_error(&err, "/dev/video0");
        assert!(matches!(classified, CameraError::DeviceBusy(_)));
        assert!(classified.to_string().contains("already in use"));
    }

    #[test]
    fn test_three_failure_messages_are_distinct() {
        // Each failure mode must be tellable apart from the message alone.
        let msgs: Vec<String> = [EACCES, ENOENT, EBUSY]
            .iter()
            .map(|&code| {
                classify_open_error(&std::io::Error::from_raw_os_error(code), "/dev/video0")
                    .to_string()
            })
            .collect();
        assert_ne!(msgs[0], msgs[1]);
        assert_ne!(msgs[1], msgs[2]);
        assert_ne!(msgs[0], msgs[2]);
    }

    #[test]
    fn test_open_missing_device() {
        let err = Camera::open("/dev/video-does-not-exist").unwrap_err();
        assert!(matches!(err, CameraError::DeviceNotFound(_)));
    }
}
