//! Motion detection
//!
//! ## Responsibilities
//!
//! - MotionDetector: frame -> bool using a stateful background model,
//!   exclusion zones, and a minimum-area threshold
//! - MotionStateMachine: detector outputs over time -> recording/alert
//!   decisions with debounce and post-roll timing
//!
//! The detector is invoked only on every Nth frame (the profile's motion
//! check interval); the state machine's timing is scaled by that interval,
//! not by wall-clock frames. Cadence itself is owned by the pipeline.

mod background;
mod mask;
mod state_machine;

pub use background::{BackgroundModel, RunningGaussianModel, MASK_FOREGROUND, MASK_SHADOW};
pub use mask::ForegroundMask;
pub use state_machine::{MotionAction, MotionPhase, MotionStateMachine};

use crate::config::MotionConfig;
use crate::frame::Frame;

/// Fixed fast learning rate substituted when the configured rate is -1
/// (auto); bounds CPU cost instead of deferring to a model default
const AUTO_LEARNING_RATE: f32 = 0.01;

/// Stateful per-camera motion detector
pub struct MotionDetector {
    config: MotionConfig,
    model: Box<dyn BackgroundModel>,
    learning_rate: f32,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        let model = Box::new(RunningGaussianModel::new(config.model.clone()));
        Self::with_model(config, model)
    }

    /// Inject a custom background model (tests, alternative segmenters)
    pub fn with_model(config: MotionConfig, model: Box<dyn BackgroundModel>) -> Self {
        let learning_rate = if config.model.learning_rate < 0.0 {
            AUTO_LEARNING_RATE
        } else {
            config.model.learning_rate
        };
        Self {
            config,
            model,
            learning_rate,
        }
    }

    /// Update the background model with `frame` and decide whether motion
    /// is present.
    ///
    /// The total-count check is a cheap early-out: when the whole mask
    /// holds fewer foreground pixels than `min_area`, no single component
    /// can exceed it either.
    pub fn apply(&mut self, frame: &Frame) -> bool {
        let raw = self.model.apply(frame, self.learning_rate);
        let mut mask = ForegroundMask::from_raw(frame.width(), frame.height(), raw);

        for zone in &self.config.exclusion_zones {
            if zone.len() >= 3 {
                mask.zero_polygon(zone);
            }
        }

        mask.open();

        let min_area = self.config.min_area as usize;
        if mask.count_nonzero() < min_area {
            return false;
        }

        mask.component_areas().into_iter().any(|area| area > min_area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Model that returns a preset mask regardless of input
    struct StaticModel {
        mask: Vec<u8>,
    }

    impl BackgroundModel for StaticModel {
        fn apply(&mut self, _frame: &Frame, _learning_rate: f32) -> Vec<u8> {
            self.mask.clone()
        }
    }

    const W: u32 = 100;
    const H: u32 = 100;

    fn detector_with_mask(mask: Vec<u8>, config: MotionConfig) -> MotionDetector {
        MotionDetector::with_model(config, Box::new(StaticModel { mask }))
    }

    fn blank_frame() -> Frame {
        Frame::new(W, H, vec![0; (W * H * 3) as usize]).unwrap()
    }

    fn mask_with_rect(x0: usize, y0: usize, w: usize, h: usize) -> Vec<u8> {
        let mut mask = vec![0u8; (W * H) as usize];
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask[y * W as usize + x] = 255;
            }
        }
        mask
    }

    fn config_with_min_area(min_area: u32) -> MotionConfig {
        MotionConfig {
            enabled: true,
            min_area,
            ..MotionConfig::default()
        }
    }

    #[test]
    fn below_min_area_reports_false() {
        // One 20x20 blob: 400 foreground pixels, under min_area 500
        let mask = mask_with_rect(10, 10, 20, 20);
        let mut detector = detector_with_mask(mask, config_with_min_area(500));
        assert!(!detector.apply(&blank_frame()));
    }

    #[test]
    fn single_large_component_reports_true() {
        // 40x20 = 800 pixels in one component, above min_area 500
        let mask = mask_with_rect(10, 10, 40, 20);
        let mut detector = detector_with_mask(mask, config_with_min_area(500));
        assert!(detector.apply(&blank_frame()));
    }

    #[test]
    fn many_small_components_do_not_trigger() {
        // Three 18x18 blobs: 972 pixels total, no single component > 500
        let mut mask = vec![0u8; (W * H) as usize];
        for (x0, y0) in [(2usize, 2usize), (40, 2), (2, 60)] {
            for y in y0..y0 + 18 {
                for x in x0..x0 + 18 {
                    mask[y * W as usize + x] = 255;
                }
            }
        }
        let mut detector = detector_with_mask(mask, config_with_min_area(500));
        assert!(!detector.apply(&blank_frame()));
    }

    #[test]
    fn exclusion_zone_suppresses_motion() {
        let mask = mask_with_rect(10, 10, 40, 20);
        let mut config = config_with_min_area(500);
        config.exclusion_zones = vec![vec![[0, 0], [99, 0], [99, 99], [0, 99]]];
        let mut detector = detector_with_mask(mask, config);
        assert!(!detector.apply(&blank_frame()));
    }
}
