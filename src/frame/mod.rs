//! Frame - decoded BGR image buffer
//!
//! ## Responsibilities
//!
//! - Owned BGR24 frame value type
//! - Aspect-preserving resize to a profile's maximum width
//! - JPEG / base64 encoding for live view
//!
//! Frames are copied, never shared mutably, whenever they cross a pipeline
//! boundary (ring buffer, last-frame slot, recording writer).

use crate::error::{Error, Result};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ExtendedColorType, RgbImage};

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded BGR frame (3 channels, 8 bits per channel)
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a raw BGR24 buffer; the buffer length must be `width * height * 3`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::Internal(format!(
                "frame buffer size mismatch: got {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Raw BGR24 bytes, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grayscale copy (BT.601 luma from BGR)
    pub fn to_gray(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .map(|px| {
                let b = px[0] as f32;
                let g = px[1] as f32;
                let r = px[2] as f32;
                (0.114 * b + 0.587 * g + 0.299 * r) as u8
            })
            .collect()
    }

    /// Downscale to `max_width` preserving aspect ratio; frames already at or
    /// below the limit are returned unchanged.
    ///
    /// Resampling is channel-order agnostic, so the BGR buffer is resized
    /// directly without swapping to RGB first.
    pub fn resize_to_width(self, max_width: u32) -> Frame {
        if self.width <= max_width || max_width == 0 {
            return self;
        }
        let ratio = max_width as f64 / self.width as f64;
        let new_height = ((self.height as f64 * ratio) as u32).max(1);

        let img = RgbImage::from_raw(self.width, self.height, self.data)
            .expect("frame buffer length validated at construction");
        let resized = imageops::resize(&img, max_width, new_height, imageops::FilterType::Triangle);

        Frame {
            width: max_width,
            height: new_height,
            data: resized.into_raw(),
        }
    }

    /// Encode as JPEG at the given quality (1-100)
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        // JPEG expects RGB ordering
        let mut rgb = self.data.clone();
        for px in rgb.chunks_exact_mut(3) {
            px.swap(0, 2);
        }

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode(&rgb, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| Error::Internal(format!("JPEG encode failed: {}", e)))?;
        Ok(out)
    }

    /// Encode as base64 JPEG for live-view transport
    pub fn to_jpeg_base64(&self, quality: u8) -> Result<String> {
        let jpeg = self.to_jpeg(quality)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(jpeg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, bgr: [u8; 3]) -> Frame {
        let data: Vec<u8> = (0..width as usize * height as usize)
            .flat_map(|_| bgr)
            .collect();
        Frame::new(width, height, data).unwrap()
    }

    #[test]
    fn rejects_wrong_buffer_size() {
        assert!(Frame::new(4, 4, vec![0u8; 10]).is_err());
    }

    #[test]
    fn resize_preserves_aspect_ratio() {
        let frame = solid_frame(1920, 1080, [10, 20, 30]);
        let resized = frame.resize_to_width(640);
        assert_eq!(resized.width(), 640);
        assert_eq!(resized.height(), 360);
        assert_eq!(resized.data().len(), 640 * 360 * 3);
    }

    #[test]
    fn resize_is_noop_below_limit() {
        let frame = solid_frame(320, 240, [0, 0, 0]);
        let resized = frame.resize_to_width(640);
        assert_eq!(resized.dimensions().to_string(), "320x240");
    }

    #[test]
    fn jpeg_encode_roundtrip_dimensions() {
        let frame = solid_frame(64, 48, [50, 100, 150]);
        let jpeg = frame.to_jpeg(70).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn base64_jpeg_decodes() {
        let frame = solid_frame(16, 16, [1, 2, 3]);
        let encoded = frame.to_jpeg_base64(50).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
