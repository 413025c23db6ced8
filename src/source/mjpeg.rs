//! Direct-decode HTTP MJPEG frame source
//!
//! Reads a multipart MJPEG byte stream over HTTP and decodes each JPEG
//! in-process; no external decoder involved. Frames are located by scanning
//! for SOI/EOI markers, which works across the boundary formats cameras
//! actually emit.

use crate::error::{Error, Result};
use crate::frame::{Dimensions, Frame};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::timeout;

/// Bound on waiting for the next chunk of the HTTP stream
const CHUNK_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on the accumulation buffer; a stream that never closes a JPEG is
/// broken, not large
const MAX_PENDING_BYTES: usize = 32 * 1024 * 1024;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

pub struct MjpegFrameSource {
    url: String,
    client: reqwest::Client,
    stream: Option<Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send + Sync>>>,
    pending: Vec<u8>,
    first_frame: Option<Frame>,
}

impl MjpegFrameSource {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            url,
            client,
            stream: None,
            pending: Vec::new(),
            first_frame: None,
        }
    }

    /// Pull chunks until a complete JPEG is buffered, then decode it
    async fn read_jpeg_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(jpeg) = self.extract_jpeg() {
                return decode_jpeg_bgr(&jpeg);
            }
            if self.pending.len() > MAX_PENDING_BYTES {
                return Err(Error::Read("MJPEG stream without frame boundary".to_string()));
            }

            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::Read("source not connected".to_string()))?;

            match timeout(CHUNK_TIMEOUT, stream.next()).await {
                Ok(Some(Ok(chunk))) => self.pending.extend_from_slice(&chunk),
                Ok(Some(Err(e))) => return Err(Error::Read(format!("HTTP stream error: {}", e))),
                Ok(None) => return Err(Error::Read("HTTP stream ended".to_string())),
                Err(_) => {
                    return Err(Error::Read(format!(
                        "chunk timeout ({}s)",
                        CHUNK_TIMEOUT.as_secs()
                    )))
                }
            }
        }
    }

    /// Slice the next complete SOI..EOI range out of the pending buffer
    fn extract_jpeg(&mut self) -> Option<Vec<u8>> {
        let start = find_marker(&self.pending, &SOI)?;
        let end_rel = find_marker(&self.pending[start + 2..], &EOI)?;
        let end = start + 2 + end_rel + 2;
        let jpeg = self.pending[start..end].to_vec();
        self.pending.drain(..end);
        Some(jpeg)
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

/// Decode a JPEG into a BGR frame
fn decode_jpeg_bgr(jpeg: &[u8]) -> Result<Frame> {
    let decoded = image::load_from_memory(jpeg)
        .map_err(|e| Error::Read(format!("JPEG decode failed: {}", e)))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut data = rgb.into_raw();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    Frame::new(width, height, data)
}

#[async_trait]
impl super::FrameSource for MjpegFrameSource {
    async fn connect(&mut self) -> Result<Dimensions> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Connect(format!("HTTP connect failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Connect(format!(
                "HTTP status {} from {}",
                response.status(),
                self.url
            )));
        }

        self.stream = Some(Box::pin(response.bytes_stream()));
        self.pending.clear();

        // Decode one frame to learn the stream dimensions; handed back on
        // the first next_frame call so it is not lost
        let frame = self
            .read_jpeg_frame()
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        let dims = frame.dimensions();
        self.first_frame = Some(frame);

        tracing::debug!(url = %self.url, dims = %dims, "MJPEG frame source connected");
        Ok(dims)
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        if let Some(frame) = self.first_frame.take() {
            return Ok(frame);
        }
        self.read_jpeg_frame().await
    }

    async fn close(&mut self) {
        self.stream = None;
        self.pending.clear();
        self.first_frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_jpeg_between_markers() {
        let mut source = MjpegFrameSource::new("http://example/mjpeg".to_string());
        source.pending = vec![0x00, 0x01, 0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9, 0x02];
        let jpeg = source.extract_jpeg().unwrap();
        assert_eq!(jpeg, vec![0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        // Trailing bytes stay pending for the next frame
        assert_eq!(source.pending, vec![0x02]);
    }

    #[test]
    fn incomplete_jpeg_stays_pending() {
        let mut source = MjpegFrameSource::new("http://example/mjpeg".to_string());
        source.pending = vec![0xFF, 0xD8, 0xAA, 0xBB];
        assert!(source.extract_jpeg().is_none());
        assert_eq!(source.pending.len(), 4);
    }

    #[test]
    fn decodes_real_jpeg_to_bgr() {
        // Encode a solid red RGB image, expect red in the BGR channel order
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode(
                img.as_raw(),
                8,
                8,
                image::ExtendedColorType::Rgb8,
            )
            .unwrap();

        let frame = decode_jpeg_bgr(&jpeg).unwrap();
        assert_eq!(frame.dimensions().width, 8);
        let px = &frame.data()[..3];
        // BGR: blue low, red high
        assert!(px[0] < 60 && px[2] > 150);
    }
}
