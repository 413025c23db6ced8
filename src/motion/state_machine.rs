//! Motion state machine
//!
//! Consumes detector outputs over time and decides when recordings start,
//! when they finalize, and when alerts fire. Pure state + actions: the
//! pipeline performs the I/O, so the timing rules are testable without it.
//!
//! Timing is counted in detector invocations, which run every Nth frame;
//! the post-roll threshold is therefore
//! `post_record_seconds * target_fps / motion_check_interval_frames`.

use crate::config::{CameraConfig, PerformanceProfile};
use chrono::{DateTime, Duration, Utc};

/// Current phase of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    /// No motion observed
    Idle,
    /// Motion currently observed
    Active,
    /// Motion absent, post-roll counting
    CoolingDown,
}

/// Side effects requested by a transition; executed by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionAction {
    /// Fire-and-forget motion notification
    DispatchAlert { at: DateTime<Utc> },
    /// Start a motion recording session (pre-roll flushed first)
    StartRecording,
    /// Finalize the open motion recording session
    FinalizeRecording,
}

pub struct MotionStateMachine {
    phase: MotionPhase,
    started_at: Option<DateTime<Utc>>,
    cooldown_checks: u32,
    /// Detector invocations of absence before the episode ends
    post_roll_checks: u32,
    min_duration: Duration,
    record_on_motion: bool,
    continuous: bool,
    send_alerts: bool,
}

impl MotionStateMachine {
    pub fn new(camera: &CameraConfig, profile: &PerformanceProfile) -> Self {
        let interval = profile.motion_check_interval_frames.max(1);
        let post_roll_checks =
            (camera.motion.post_record_seconds * profile.target_fps / interval).max(1);
        Self {
            phase: MotionPhase::Idle,
            started_at: None,
            cooldown_checks: 0,
            post_roll_checks,
            min_duration: Duration::seconds(camera.motion.min_duration_seconds as i64),
            record_on_motion: camera.recording.on_motion,
            continuous: camera.recording.continuous,
            send_alerts: camera.alerts.send_alerts,
        }
    }

    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Feed one detector result; returns the actions the pipeline must take
    pub fn observe(&mut self, motion: bool, now: DateTime<Utc>) -> Vec<MotionAction> {
        let mut actions = Vec::new();

        if motion {
            match self.phase {
                MotionPhase::Idle => {
                    self.phase = MotionPhase::Active;
                    self.started_at = Some(now);
                    self.cooldown_checks = 0;
                    if self.send_alerts {
                        actions.push(MotionAction::DispatchAlert { at: now });
                    }
                    // Continuous mode owns the writer; motion never starts
                    // or stops a session while it is active
                    if self.record_on_motion && !self.continuous {
                        actions.push(MotionAction::StartRecording);
                    }
                }
                MotionPhase::Active | MotionPhase::CoolingDown => {
                    self.phase = MotionPhase::Active;
                    self.cooldown_checks = 0;
                }
            }
            return actions;
        }

        match self.phase {
            MotionPhase::Idle => {}
            MotionPhase::Active | MotionPhase::CoolingDown => {
                self.phase = MotionPhase::CoolingDown;
                self.cooldown_checks += 1;

                if self.cooldown_checks >= self.post_roll_checks {
                    let long_enough = self
                        .started_at
                        .map(|start| now - start >= self.min_duration)
                        .unwrap_or(false);

                    // A too-short episode is discarded without touching any
                    // open session
                    if long_enough && self.record_on_motion && !self.continuous {
                        actions.push(MotionAction::FinalizeRecording);
                    }

                    self.phase = MotionPhase::Idle;
                    self.started_at = None;
                    self.cooldown_checks = 0;
                }
            }
        }
        actions
    }
}
