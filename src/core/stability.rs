//! Detection-loss smoothing for the raw pose stream.
//!
//! Single-frame dropouts (brief occlusion, motion blur) are bridged by
//! holding the last good pose. Only when detection stays lost for longer
//! than the loss timeout does the tracker report an empty pose and a
//! one-shot `DetectionLost` event.

use crate::pose::types::JointMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the returned pose was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityStatus {
    /// The raw frame had usable joints
    Tracking,
    /// Raw frame was empty; last good pose returned
    Holding,
    /// No pose available (timeout exceeded or never detected)
    Lost,
}

/// Edge-triggered notifications for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityEvent {
    /// Detection has been lost; dependent smoothing state should be reset.
    /// Fires once per loss episode.
    DetectionLost,
}

/// Result of a single tracker update.
#[derive(Debug, Clone)]
pub struct StabilityOutput {
    pub joints: JointMap,
    pub status: StabilityStatus,
    pub event: Option<StabilityEvent>,
}

/// Confidence-gated hold-and-timeout tracker.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    /// Joints at or below this confidence do not count as a detection
    visibility_threshold: f64,
    /// Maximum hold duration in seconds
    loss_timeout: f64,
    /// Most recent non-empty gated pose
    last_good_joints: JointMap,
    /// Start of the current loss episode (only set when a good pose exists)
    loss_started_at: Option<f64>,
    /// Whether `DetectionLost` has fired in the current episode
    loss_reported: bool,
}

impl StabilityTracker {
    /// Create a tracker with the given gating threshold and timeout.
    pub fn new(visibility_threshold: f64, loss_timeout: Duration) -> Self {
        Self {
            visibility_threshold,
            loss_timeout: loss_timeout.as_secs_f64(),
            last_good_joints: JointMap::new(),
            loss_started_at: None,
            loss_reported: false,
        }
    }

    /// Feed one raw frame and get the stabilized pose.
    pub fn update(&mut self, raw_joints: &JointMap, now: f64) -> StabilityOutput {
        let gated = raw_joints.filtered(self.visibility_threshold);

        if !gated.is_empty() {
            if self.loss_started_at.is_some() || self.loss_reported {
                tracing::debug!("Detection recovered at t={:.2}", now);
            }
            self.loss_started_at = None;
            self.loss_reported = false;
            self.last_good_joints = gated.clone();
            return StabilityOutput {
                joints: gated,
                status: StabilityStatus::Tracking,
                event: None,
            };
        }

        if self.last_good_joints.is_empty() {
            // Nothing to hold; the episode starts (and is reported) right away.
            return self.report_lost();
        }

        let started = *self.loss_started_at.get_or_insert(now);
        if now - started < self.loss_timeout {
            return StabilityOutput {
                joints: self.last_good_joints.clone(),
                status: StabilityStatus::Holding,
                event: None,
            };
        }

        self.report_lost()
    }

    fn report_lost(&mut self) -> StabilityOutput {
        let event = if self.loss_reported {
            None
        } else {
            self.loss_reported = true;
            tracing::debug!("Detection lost");
            Some(StabilityEvent::DetectionLost)
        };
        StabilityOutput {
            joints: JointMap::new(),
            status: StabilityStatus::Lost,
            event,
        }
    }

    /// Forget all history (new session).
    pub fn reset(&mut self) {
        self.last_good_joints = JointMap::new();
        self.loss_started_at = None;
        self.loss_reported = false;
    }

    /// Start of the current loss episode, if one is in progress.
    pub fn loss_started_at(&self) -> Option<f64> {
        self.loss_started_at
    }

    /// The pose that would be held on the next empty frame.
    pub fn last_good_joints(&self) -> &JointMap {
        &self.last_good_joints
    }
}
