//! Frame type and pixel conversion to packed RGB.

use std::time::Instant;

/// A captured camera frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Packed RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    pub sequence: u32,
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 limited-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U and V.
/// Rows are `stride` bytes apart. An odd width still occupies a whole pair,
/// whose second pixel is dropped.
pub fn yuyv_to_rgb(
    yuyv: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> Result<Vec<u8>, FrameError> {
    let width = width as usize;
    let row_bytes = width.div_ceil(2) * 4;
    let mut rgb = Vec::with_capacity(width * height as usize * 3);
    for row in rows(yuyv, row_bytes, stride, height)? {
        let start = rgb.len();
        for chunk in row.chunks_exact(4) {
            let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
            rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
            rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
        }
        rgb.truncate(start + width * 3);
    }
    Ok(rgb)
}

/// Replicate 8-bit grayscale into all three channels.
pub fn grey_to_rgb(
    gray: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> Result<Vec<u8>, FrameError> {
    let width = width as usize;
    let mut rgb = Vec::with_capacity(width * height as usize * 3);
    for row in rows(gray, width, stride, height)? {
        rgb.extend(row.iter().flat_map(|&g| [g, g, g]));
    }
    Ok(rgb)
}

/// Downscale 16-bit little-endian grayscale to 8 bits and replicate to RGB.
pub fn y16_to_rgb(
    buf: &[u8],
    width: u32,
    height: u32,
    stride: usize,
) -> Result<Vec<u8>, FrameError> {
    let width = width as usize;
    let mut rgb = Vec::with_capacity(width * height as usize * 3);
    for row in rows(buf, width * 2, stride, height)? {
        rgb.extend(row.chunks_exact(2).flat_map(|px| {
            let g = (u16::from_le_bytes([px[0], px[1]]) >> 8) as u8;
            [g, g, g]
        }));
    }
    Ok(rgb)
}

/// Split `buf` into `height` rows of `row_bytes`, starting `stride` bytes apart.
/// A stride smaller than the row (e.g. 0 from a driver that leaves it unset)
/// means tightly packed rows.
fn rows<'a>(
    buf: &'a [u8],
    row_bytes: usize,
    stride: usize,
    height: u32,
) -> Result<impl Iterator<Item = &'a [u8]> + 'a, FrameError> {
    let stride = stride.max(row_bytes);
    let height = height as usize;
    let expected = match height {
        0 => 0,
        h => stride * (h - 1) + row_bytes,
    };
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok((0..height).map(move |r| &buf[r * stride..r * stride + row_bytes]))
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| (x >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e + 128),
        clamp(298 * c - 100 * d - 208 * e + 128),
        clamp(298 * c + 516 * d + 128),
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_black_and_white() {
        // 2x1: black pixel then white pixel, neutral chroma
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1, 4).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_gray() {
        let yuyv = vec![128, 128, 128, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1, 4).unwrap();
        assert_eq!(rgb.len(), 6);
        assert!(rgb.iter().all(|&c| c == rgb[0]));
    }

    #[test]
    fn test_yuyv_red_dominant() {
        // High V pushes red up and green down
        let yuyv = vec![82, 90, 82, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1, 4).unwrap();
        assert!(rgb[0] > 200, "red: {}", rgb[0]);
        assert!(rgb[1] < 50, "green: {}", rgb[1]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_rgb(&yuyv, 2, 1, 4).is_err());
    }

    #[test]
    fn test_grey_to_rgb() {
        let rgb = grey_to_rgb(&[10, 200], 2, 1, 2).unwrap();
        assert_eq!(rgb, vec![10, 10, 10, 200, 200, 200]);
        assert!(grey_to_rgb(&[10], 2, 1, 2).is_err());
    }

    #[test]
    fn test_y16_to_rgb() {
        // 0x1234 -> high byte 0x12; 0xFF00 -> 0xFF
        let buf = vec![0x34, 0x12, 0x00, 0xFF];
        let rgb = y16_to_rgb(&buf, 2, 1, 4).unwrap();
        assert_eq!(rgb, vec![0x12, 0x12, 0x12, 0xFF, 0xFF, 0xFF]);
        assert!(y16_to_rgb(&buf[..3], 2, 1, 4).is_err());
    }

    #[test]
    fn test_yuyv_odd_width_keeps_every_pixel() {
        // 3x2: each row holds two pairs (8 bytes); the second pixel of the last pair is padding
        let row = [16, 128, 235, 128, 235, 128, 16, 128];
        let yuyv: Vec<u8> = row.iter().chain(row.iter()).copied().collect();
        let rgb = yuyv_to_rgb(&yuyv, 3, 2, 8).unwrap();
        assert_eq!(rgb.len(), 3 * 2 * 3);
        assert_eq!(&rgb[..9], &[0, 0, 0, 255, 255, 255, 255, 255, 255]);
        assert_eq!(&rgb[9..], &rgb[..9]);
    }

    #[test]
    fn test_yuyv_skips_row_padding() {
        // 2x2 with 8-byte stride: 4 bytes of pixels then 4 bytes of padding per row
        let yuyv = vec![
            16, 128, 16, 128, 99, 99, 99, 99, //
            235, 128, 235, 128, 99, 99, 99, 99,
        ];
        let rgb = yuyv_to_rgb(&yuyv, 2, 2, 8).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 0, 0, 0, 255, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_last_row_needs_no_padding() {
        // Drivers may omit trailing padding after the final row
        let gray = vec![1, 2, 0, 0, 3, 4];
        let rgb = grey_to_rgb(&gray, 2, 2, 4).unwrap();
        assert_eq!(rgb, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn test_zero_stride_means_packed() {
        let rgb = grey_to_rgb(&[5, 6, 7, 8], 2, 2, 0).unwrap();
        assert_eq!(rgb, vec![5, 5, 5, 6, 6, 6, 7, 7, 7, 8, 8, 8]);
    }
}
