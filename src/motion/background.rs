//! Background model - pluggable foreground/background segmentation
//!
//! The pipeline treats background subtraction as an opaque capability: any
//! model that can turn a frame into a per-pixel foreground mask plugs in
//! here. The shipped default keeps a running mean/variance per pixel over
//! grayscale, driven by the same tuning fields an MOG2-style model takes.

use crate::config::BackgroundModelConfig;
use crate::frame::Frame;

/// Foreground mask pixel values
pub const MASK_FOREGROUND: u8 = 255;
pub const MASK_SHADOW: u8 = 127;

/// Stateful per-pixel background model
pub trait BackgroundModel: Send + Sync {
    /// Update the model with `frame` and return a foreground mask of the
    /// same dimensions: 0 background, 127 shadow, 255 foreground.
    fn apply(&mut self, frame: &Frame, learning_rate: f32) -> Vec<u8>;
}

/// Running per-pixel mean/variance model over grayscale
pub struct RunningGaussianModel {
    config: BackgroundModelConfig,
    width: u32,
    height: u32,
    mean: Vec<f32>,
    variance: Vec<f32>,
}

/// Initial and minimum per-pixel variance, keeps the threshold meaningful
/// before the model has seen enough frames
const INITIAL_VARIANCE: f32 = 225.0;
const MIN_VARIANCE: f32 = 4.0;

impl RunningGaussianModel {
    pub fn new(config: BackgroundModelConfig) -> Self {
        Self {
            config,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
        }
    }

    fn reset(&mut self, gray: &[u8], width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.mean = gray.iter().map(|&g| g as f32).collect();
        self.variance = vec![INITIAL_VARIANCE; gray.len()];
    }
}

impl BackgroundModel for RunningGaussianModel {
    fn apply(&mut self, frame: &Frame, learning_rate: f32) -> Vec<u8> {
        let gray = frame.to_gray();

        if frame.width() != self.width || frame.height() != self.height {
            // First frame (or dimension change): seed the model, no motion
            self.reset(&gray, frame.width(), frame.height());
            return vec![0; gray.len()];
        }

        let alpha = if learning_rate > 0.0 {
            learning_rate.min(1.0)
        } else {
            1.0 / self.config.history.max(1) as f32
        };

        let mut mask = vec![0u8; gray.len()];
        for (i, &g) in gray.iter().enumerate() {
            let value = g as f32;
            let diff = value - self.mean[i];
            let sq = diff * diff;

            if sq > self.config.var_threshold * self.variance[i] {
                // Shadow heuristic: darker than the modeled background but
                // not by more than half
                if self.config.detect_shadows
                    && value < self.mean[i]
                    && value > 0.5 * self.mean[i]
                {
                    mask[i] = MASK_SHADOW;
                } else {
                    mask[i] = MASK_FOREGROUND;
                }
            }

            self.mean[i] += alpha * diff;
            self.variance[i] = (self.variance[i] + alpha * (sq - self.variance[i])).max(MIN_VARIANCE);
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: u32, height: u32, level: u8) -> Frame {
        Frame::new(
            width,
            height,
            vec![level; width as usize * height as usize * 3],
        )
        .unwrap()
    }

    #[test]
    fn first_frame_reports_no_motion() {
        let mut model = RunningGaussianModel::new(BackgroundModelConfig::default());
        let mask = model.apply(&gray_frame(8, 8, 100), 0.01);
        assert!(mask.iter().all(|&p| p == 0));
    }

    #[test]
    fn static_scene_stays_background() {
        let mut model = RunningGaussianModel::new(BackgroundModelConfig::default());
        for _ in 0..10 {
            let mask = model.apply(&gray_frame(8, 8, 100), 0.01);
            assert!(mask.iter().all(|&p| p == 0));
        }
    }

    #[test]
    fn sudden_change_is_foreground() {
        let mut model = RunningGaussianModel::new(BackgroundModelConfig::default());
        for _ in 0..20 {
            model.apply(&gray_frame(8, 8, 40), 0.01);
        }
        let mask = model.apply(&gray_frame(8, 8, 250), 0.01);
        assert!(mask.iter().all(|&p| p == MASK_FOREGROUND));
    }

    #[test]
    fn moderate_darkening_labeled_shadow() {
        let mut model = RunningGaussianModel::new(BackgroundModelConfig::default());
        for _ in 0..20 {
            model.apply(&gray_frame(8, 8, 200), 0.01);
        }
        // 60% of the background level: inside the shadow band
        let mask = model.apply(&gray_frame(8, 8, 120), 0.01);
        assert!(mask.iter().all(|&p| p == MASK_SHADOW));
    }
}
