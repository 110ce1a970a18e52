//! Frame type and image processing — YUYV conversion and bilinear resize.

use thiserror::Error;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB24 pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Average pixel brightness (0.0–255.0), across all channels.
    ///
    /// Used only for operator feedback — prints scan best when well-lit
    /// and centered, and a low number explains a failed scan.
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }

    /// Downscale to a square `size`x`size` RGB buffer for the extractor.
    pub fn to_rgb_square(&self, size: u32) -> Vec<u8> {
        resize_rgb_bilinear(&self.data, self.width, self.height, size, size)
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to packed RGB24 using BT.601 full range.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; U and V are
/// shared by the pixel pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width as usize) * (height as usize);
    let expected = pixels * 2;
    // Two pixels per 4-byte group: an odd pixel count cannot be
    // represented without splitting a group, so reject it rather than
    // silently truncating the last pixel.
    if pixels % 2 != 0 || yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as f32;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;

    let r = c + 1.402 * e;
    let g = c - 0.344136 * d - 0.714136 * e;
    let b = c + 1.772 * d;

    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

/// Bilinear resize of a packed RGB24 buffer.
pub fn resize_rgb_bilinear(
    src: &[u8],
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Vec<u8> {
    let (sw, sh) = (src_w as usize, src_h as usize);
    let (dw, dh) = (dst_w as usize, dst_h as usize);
    if sw == 0 || sh == 0 || dw == 0 || dh == 0 || src.len() < sw * sh * 3 {
        return vec![0u8; dw * dh * 3];
    }

    let mut dst = Vec::with_capacity(dw * dh * 3);
    let scale_x = sw as f32 / dw as f32;
    let scale_y = sh as f32 / dh as f32;

    for dy in 0..dh {
        // Sample at pixel centers to avoid edge bias.
        let sy = ((dy as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (sh - 1) as f32);
        let y0 = sy as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let fy = sy - y0 as f32;

        for dx in 0..dw {
            let sx = ((dx as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (sw - 1) as f32);
            let x0 = sx as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let fx = sx - x0 as f32;

            for c in 0..3 {
                let tl = src[(y0 * sw + x0) * 3 + c] as f32;
                let tr = src[(y0 * sw + x1) * 3 + c] as f32;
                let bl = src[(y1 * sw + x0) * 3 + c] as f32;
                let br = src[(y1 * sw + x1) * 3 + c] as f32;

                let top = tl * (1.0 - fx) + tr * fx;
                let bot = bl * (1.0 - fx) + br * fx;
                let val = top * (1.0 - fy) + bot * fy;
                dst.push(val.round().clamp(0.0, 255.0) as u8);
            }
        }
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_neutral_chroma_is_gray() {
        // U = V = 128 means no chroma: RGB should equal Y.
        let yuyv = vec![100, 128, 200, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn test_yuyv_to_rgb_red_push() {
        // High V pushes red up and green down.
        let yuyv = vec![128, 128, 128, 255];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > 200, "red should be pushed up, got {}", rgb[0]);
        assert!(rgb[1] < 100, "green should be pushed down, got {}", rgb[1]);
        assert_eq!(rgb[2], 128, "blue unaffected by V");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_yuyv_odd_pixel_count_rejected() {
        // 3x1 = 3 pixels cannot be packed into whole YUYV groups; the
        // buffer must be rejected, never truncated to a short result.
        let yuyv = vec![0u8; 6];
        assert!(yuyv_to_rgb(&yuyv, 3, 1).is_err());
        // 1x1 likewise, even when the byte length looks plausible.
        assert!(yuyv_to_rgb(&[100, 128], 1, 1).is_err());
    }

    #[test]
    fn test_resize_identity() {
        // 2x2 RGB image resized to itself is unchanged.
        let src: Vec<u8> = (0..12).collect();
        let dst = resize_rgb_bilinear(&src, 2, 2, 2, 2);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let src = vec![77u8; 8 * 6 * 3];
        let dst = resize_rgb_bilinear(&src, 8, 6, 4, 4);
        assert_eq!(dst.len(), 4 * 4 * 3);
        assert!(dst.iter().all(|&p| p == 77));
    }

    #[test]
    fn test_resize_downscale_dimensions() {
        let src = vec![0u8; 640 * 480 * 3];
        let dst = resize_rgb_bilinear(&src, 640, 480, 224, 224);
        assert_eq!(dst.len(), 224 * 224 * 3);
    }

    #[test]
    fn test_frame_square_helper() {
        let frame = Frame {
            data: vec![10u8; 32 * 16 * 3],
            width: 32,
            height: 16,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        let rgb = frame.to_rgb_square(8);
        assert_eq!(rgb.len(), 8 * 8 * 3);
        assert!(rgb.iter().all(|&p| p == 10));
    }

    #[test]
    fn test_avg_brightness() {
        let frame = Frame {
            data: vec![0, 255, 0, 255, 0, 255],
            width: 2,
            height: 1,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        assert!((frame.avg_brightness() - 127.5).abs() < 1e-3);
    }
}
