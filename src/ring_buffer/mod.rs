//! FrameRingBuffer - fixed-capacity pre-roll buffer
//!
//! ## Responsibilities
//!
//! - Keep the most recent frames so a motion recording can start
//!   `pre_record_seconds` before the triggering detection
//!
//! Capacity is `pre_record_seconds * target_fps`, fixed for the pipeline's
//! lifetime. The buffer is owned exclusively by one pipeline's writer side;
//! snapshots hand out copies.

use crate::config::{CameraConfig, PerformanceProfile};
use crate::frame::Frame;
use std::collections::VecDeque;

/// Circular buffer of recent frames
pub struct FrameRingBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl FrameRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Buffer sized for a camera's pre-roll window at the profile's rate
    pub fn for_camera(camera: &CameraConfig, profile: &PerformanceProfile) -> Self {
        Self::new((camera.motion.pre_record_seconds * profile.target_fps) as usize)
    }

    /// Append a frame, evicting the oldest when full. A zero-capacity
    /// buffer (pre-roll disabled) drops everything.
    pub fn push(&mut self, frame: Frame) {
        if self.capacity == 0 {
            return;
        }
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Copy of the buffered frames, oldest first
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalSettings;

    fn frame_with_marker(marker: u8) -> Frame {
        Frame::new(2, 1, vec![marker, 0, 0, 0, 0, 0]).unwrap()
    }

    #[test]
    fn capacity_is_pre_roll_times_fps() {
        let mut camera: CameraConfig =
            serde_json::from_str(r#"{"id":"cam-1","name":"c","url":"rtsp://x"}"#).unwrap();
        camera.motion.pre_record_seconds = 5;
        let settings = GlobalSettings::default();
        let profile = settings.profiles.get("medium").unwrap();
        assert_eq!(profile.target_fps, 15);

        let buffer = FrameRingBuffer::for_camera(&camera, profile);
        assert_eq!(buffer.capacity(), 75);
    }

    #[test]
    fn evicts_oldest_and_preserves_order() {
        let mut buffer = FrameRingBuffer::new(3);
        for marker in 0..5u8 {
            buffer.push(frame_with_marker(marker));
        }
        assert_eq!(buffer.len(), 3);

        let markers: Vec<u8> = buffer.snapshot().iter().map(|f| f.data()[0]).collect();
        assert_eq!(markers, vec![2, 3, 4]);
    }

    #[test]
    fn partial_fill_returns_what_exists() {
        let mut buffer = FrameRingBuffer::new(10);
        buffer.push(frame_with_marker(7));
        assert_eq!(buffer.snapshot().len(), 1);
    }

    #[test]
    fn zero_capacity_drops_frames() {
        let mut buffer = FrameRingBuffer::new(0);
        buffer.push(frame_with_marker(1));
        assert!(buffer.is_empty());
    }
}
