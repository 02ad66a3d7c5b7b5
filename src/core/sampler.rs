//! Frame sampling for analysis passes.
//!
//! Live passes use the recent window as-is. Full passes over long sessions
//! use motion-adaptive decimation: frames are kept densely while the body
//! is moving and sparsely during static holds, so repetition transitions
//! keep their temporal resolution while the payload stays bounded.

use crate::config::AnalysisConfig;
use crate::pose::types::{JointFrame, JointName};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Which analysis pass the frames are sampled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    Live,
    Full,
}

/// Sampler tunables.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Full-mode inputs up to this length are returned unchanged
    pub full_threshold: usize,
    /// Movement above this counts as active
    pub motion_threshold: f64,
    /// Keep every Nth candidate while active
    pub active_stride: usize,
    /// Keep every Nth candidate while static
    pub idle_stride: usize,
    /// Minimum confidence for a joint to contribute to movement
    pub confidence_threshold: f64,
    /// Joints whose displacement defines movement
    pub key_joints: Vec<JointName>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for SamplerConfig {
    fn from(config: &AnalysisConfig) -> Self {
        let mut key_joints = vec![
            JointName::LeftWrist,
            JointName::RightWrist,
            JointName::LeftShoulder,
            JointName::RightShoulder,
        ];
        if config.include_hips_in_movement {
            key_joints.push(JointName::LeftHip);
            key_joints.push(JointName::RightHip);
        }

        Self {
            full_threshold: config.full_sample_threshold,
            motion_threshold: config.motion_threshold,
            active_stride: config.active_stride.max(1),
            idle_stride: config.idle_stride.max(1),
            confidence_threshold: config.encoding_threshold,
            key_joints,
        }
    }
}

/// Average displacement of the key joints between two frames.
///
/// Only joints present with confidence above `threshold` in both frames
/// contribute. Returns 0.0 when no joint pair qualifies.
pub fn movement_between(
    a: &JointFrame,
    b: &JointFrame,
    key_joints: &[JointName],
    threshold: f64,
) -> f64 {
    let distances: Vec<f64> = key_joints
        .iter()
        .filter_map(|joint| {
            let pa = a.joints.get(joint)?;
            let pb = b.joints.get(joint)?;
            (pa.is_usable(threshold) && pb.is_usable(threshold)).then(|| pa.distance_to(pb))
        })
        .collect();

    if distances.is_empty() {
        0.0
    } else {
        distances.mean()
    }
}

/// Deterministic frame sampler.
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Reduce `frames` to a representative subset for the given pass.
    pub fn sample(&self, frames: &[JointFrame], mode: SampleMode) -> Vec<JointFrame> {
        match mode {
            SampleMode::Live => frames.to_vec(),
            SampleMode::Full if frames.len() <= self.config.full_threshold => frames.to_vec(),
            SampleMode::Full => self.decimate(frames),
        }
    }

    fn decimate(&self, frames: &[JointFrame]) -> Vec<JointFrame> {
        let (first, rest) = match frames.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };

        let mut sampled = vec![first.clone()];
        let mut last_sampled = first;
        let mut since_last = 0usize;

        for frame in rest {
            since_last += 1;
            let movement = movement_between(
                last_sampled,
                frame,
                &self.config.key_joints,
                self.config.confidence_threshold,
            );
            let stride = if movement > self.config.motion_threshold {
                self.config.active_stride
            } else {
                self.config.idle_stride
            };

            if since_last >= stride {
                sampled.push(frame.clone());
                last_sampled = frame;
                since_last = 0;
            }
        }

        if let Some(last) = frames.last() {
            let included = sampled
                .last()
                .map(|s| s.timestamp == last.timestamp)
                .unwrap_or(false);
            if !included {
                sampled.push(last.clone());
            }
        }

        tracing::debug!(
            "Sampled {} of {} frames for full analysis",
            sampled.len(),
            frames.len()
        );
        sampled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::types::{JointMap, JointSample};

    fn frame(t: f64, wrist_x: f64) -> JointFrame {
        JointFrame::new(
            t,
            JointMap::new()
                .with(JointName::LeftWrist, JointSample::new(wrist_x, 0.5, 0.9))
                .with(JointName::RightWrist, JointSample::new(wrist_x + 0.3, 0.5, 0.9))
                .with(JointName::LeftShoulder, JointSample::new(0.4, 0.3, 0.9))
                .with(JointName::RightShoulder, JointSample::new(0.6, 0.3, 0.9)),
        )
    }

    fn wrists_only_config() -> SamplerConfig {
        SamplerConfig {
            key_joints: vec![JointName::LeftWrist, JointName::RightWrist],
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn test_live_mode_is_identity() {
        let frames: Vec<_> = (0..80).map(|i| frame(i as f64 * 0.1, 0.2)).collect();
        let sampler = Sampler::default();
        assert_eq!(sampler.sample(&frames, SampleMode::Live), frames);
    }

    #[test]
    fn test_short_full_input_unchanged() {
        let frames: Vec<_> = (0..30).map(|i| frame(i as f64 * 0.1, i as f64 * 0.01)).collect();
        let sampler = Sampler::default();
        assert_eq!(sampler.sample(&frames, SampleMode::Full), frames);
        assert!(sampler.sample(&[], SampleMode::Full).is_empty());
    }

    #[test]
    fn test_full_keeps_first_and_last() {
        for len in [31, 37, 64, 101] {
            let frames: Vec<_> = (0..len).map(|i| frame(i as f64 * 0.1, 0.2)).collect();
            let sampled = Sampler::default().sample(&frames, SampleMode::Full);
            assert_eq!(sampled.first().unwrap().timestamp, frames[0].timestamp);
            assert_eq!(sampled.last().unwrap().timestamp, frames[len - 1].timestamp);
            assert!(sampled.len() < frames.len());
            assert!(sampled.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        }
    }

    #[test]
    fn test_motion_adaptive_density() {
        // 0-29 static, 30-59 wrists move 0.06 per frame
        let frames: Vec<_> = (0..60)
            .map(|i| {
                let x = if i < 30 { 0.1 } else { 0.1 + (i - 29) as f64 * 0.06 };
                frame(i as f64 / 30.0, x)
            })
            .collect();

        let sampler = Sampler::new(wrists_only_config());
        let sampled = sampler.sample(&frames, SampleMode::Full);

        let static_kept = sampled.iter().filter(|f| f.timestamp < 30.0 / 30.0).count();
        let active_kept = sampled.len() - static_kept;
        let static_ratio = static_kept as f64 / 30.0;
        let active_ratio = active_kept as f64 / 30.0;
        assert!(
            active_ratio > static_ratio,
            "active {active_ratio} vs static {static_ratio}"
        );
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let frames: Vec<_> = (0..90)
            .map(|i| frame(i as f64 * 0.05, ((i as f64) * 0.3).sin() * 0.2 + 0.4))
            .collect();
        let sampler = Sampler::default();
        assert_eq!(
            sampler.sample(&frames, SampleMode::Full),
            sampler.sample(&frames, SampleMode::Full)
        );
    }

    #[test]
    fn test_movement_ignores_low_confidence() {
        let a = frame(0.0, 0.1);
        let mut b = frame(0.1, 0.9);
        b.joints
            .insert(JointName::LeftWrist, JointSample::new(0.9, 0.5, 0.2));
        b.joints
            .insert(JointName::RightWrist, JointSample::new(1.2, 0.5, 0.3));

        let movement = movement_between(&a, &b, &[JointName::LeftWrist, JointName::RightWrist], 0.3);
        assert_eq!(movement, 0.0);

        let shoulders = movement_between(
            &a,
            &b,
            &[JointName::LeftShoulder, JointName::RightShoulder],
            0.3,
        );
        assert_eq!(shoulders, 0.0);
    }

    #[test]
    fn test_movement_average() {
        let a = frame(0.0, 0.1);
        let b = frame(0.1, 0.2);
        let movement = movement_between(
            &a,
            &b,
            &[
                JointName::LeftWrist,
                JointName::RightWrist,
                JointName::LeftShoulder,
                JointName::RightShoulder,
            ],
            0.3,
        );
        // Wrists moved 0.1, shoulders 0.0
        assert!((movement - 0.05).abs() < 1e-9);
    }
}
