//! Compact text encoding of joint frames.
//!
//! Downstream cost scales with payload length, so each frame becomes one
//! short line:
//!
//! ```text
//! t:0.0|lw:0.213,0.540|rw:0.781,0.538|ls:0.402,0.301
//! t:0.3|lw:0.220,0.512|rw:0.774,0.509
//! ```
//!
//! Times are relative to the first frame (1 decimal), coordinates keep
//! 3 decimals, and joint names use short codes. Joints at or below the
//! encoding threshold are dropped, and frames left with no joints are
//! omitted entirely. An empty result means "no usable signal".

use crate::pose::types::{JointFrame, JointName};
use std::fmt::Write as _;

/// Short code for a joint, or the joint's own name when it has none.
pub fn abbreviate(joint: &JointName) -> &str {
    match joint.abbreviation() {
        Some(code) => code,
        None => joint.as_str(),
    }
}

/// Line-oriented feature encoder.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    threshold: f64,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl FeatureEncoder {
    /// Create an encoder that keeps joints with confidence strictly above `threshold`.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Encode frames into newline-separated lines.
    pub fn encode(&self, frames: &[JointFrame]) -> String {
        let origin = match frames.first() {
            Some(frame) => frame.timestamp,
            None => return String::new(),
        };

        frames
            .iter()
            .filter_map(|frame| self.encode_frame(frame, origin))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Encode a single frame relative to `origin`; `None` if no joint is usable.
    pub fn encode_frame(&self, frame: &JointFrame, origin: f64) -> Option<String> {
        let mut joints = frame
            .joints
            .iter()
            .filter(|(_, sample)| sample.is_usable(self.threshold))
            .peekable();
        joints.peek()?;

        let mut line = format!("t:{:.1}", frame.timestamp - origin);
        for (name, sample) in joints {
            // Writing to a String cannot fail.
            let _ = write!(line, "|{}:{:.3},{:.3}", abbreviate(name), sample.x, sample.y);
        }
        Some(line)
    }

    /// Number of frames that would produce a line.
    pub fn usable_frame_count(&self, frames: &[JointFrame]) -> usize {
        frames
            .iter()
            .filter(|frame| frame.joints.usable_count(self.threshold) > 0)
            .count()
    }
}

/// A parsed encoder line.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedLine {
    /// Relative time in seconds
    pub t: f64,
    /// (code, x, y) in line order
    pub joints: Vec<(String, f64, f64)>,
}

/// Parse one encoder line back into its parts.
pub fn parse_line(line: &str) -> Option<EncodedLine> {
    let mut parts = line.trim().split('|');
    let t = parts.next()?.strip_prefix("t:")?.parse().ok()?;

    let mut joints = Vec::new();
    for part in parts {
        let (code, coords) = part.split_once(':')?;
        let (x, y) = coords.split_once(',')?;
        joints.push((code.to_string(), x.parse().ok()?, y.parse().ok()?));
    }

    Some(EncodedLine { t, joints })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::types::{JointMap, JointSample};

    fn full_pose(t: f64) -> JointFrame {
        JointFrame::new(
            t,
            JointMap::new()
                .with(JointName::LeftWrist, JointSample::new(0.2134, 0.5401, 0.9))
                .with(JointName::RightShoulder, JointSample::new(0.6, 0.3, 0.9))
                .with(JointName::Root, JointSample::new(0.5, 0.55, 0.9)),
        )
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(abbreviate(&JointName::LeftWrist), "lw");
        assert_eq!(abbreviate(&JointName::RightShoulder), "rs");
        assert_eq!(abbreviate(&JointName::Neck), "n");
        assert_eq!(abbreviate(&JointName::Root), "rt");
        assert_eq!(abbreviate(&JointName::Nose), "ns");
        assert_eq!(abbreviate(&JointName::Other("leftEar".to_string())), "leftEar");
    }

    #[test]
    fn test_line_format() {
        let encoded = FeatureEncoder::default().encode(&[full_pose(10.0)]);
        assert_eq!(encoded, "t:0.0|lw:0.213,0.540|rs:0.600,0.300|rt:0.500,0.550");
    }

    #[test]
    fn test_identical_frames_scenario() {
        let frames = vec![full_pose(3.0), full_pose(3.25), full_pose(3.5)];
        let encoded = FeatureEncoder::default().encode(&frames);
        let lines: Vec<_> = encoded.lines().collect();
        assert_eq!(lines.len(), 3);

        let parsed: Vec<_> = lines.iter().map(|l| parse_line(l).unwrap()).collect();
        assert_eq!(parsed[0].t, 0.0);
        assert!(parsed.windows(2).all(|w| w[0].t < w[1].t));
        for line in &parsed {
            let codes: Vec<_> = line.joints.iter().map(|j| j.0.as_str()).collect();
            assert_eq!(codes, vec!["lw", "rs", "rt"]);
        }
    }

    #[test]
    fn test_low_confidence_joints_and_frames_dropped() {
        let weak = JointFrame::new(
            1.0,
            JointMap::new()
                .with(JointName::Nose, JointSample::new(0.5, 0.1, 0.3))
                .with(JointName::Neck, JointSample::new(0.5, 0.2, 0.1)),
        );
        let mixed = JointFrame::new(
            2.0,
            JointMap::new()
                .with(JointName::Nose, JointSample::new(0.5, 0.1, 0.2))
                .with(JointName::Neck, JointSample::new(0.5, 0.2, 0.8)),
        );
        let encoder = FeatureEncoder::default();
        let encoded = encoder.encode(&[full_pose(0.0), weak, mixed]);

        let lines: Vec<_> = encoded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "t:2.0|n:0.500,0.200");
    }

    #[test]
    fn test_no_usable_signal_is_empty() {
        let weak = JointFrame::new(
            0.0,
            JointMap::new().with(JointName::Nose, JointSample::new(0.5, 0.1, 0.1)),
        );
        let encoder = FeatureEncoder::default();
        assert_eq!(encoder.encode(&[weak.clone(), weak]), "");
        assert_eq!(encoder.encode(&[]), "");
    }

    #[test]
    fn test_time_relative_to_first_input_frame() {
        // The first frame has no usable joints but still anchors time.
        let weak = JointFrame::new(
            5.0,
            JointMap::new().with(JointName::Nose, JointSample::new(0.5, 0.1, 0.1)),
        );
        let encoded = FeatureEncoder::default().encode(&[weak, full_pose(6.5)]);
        assert!(encoded.starts_with("t:1.5|"));
    }

    #[test]
    fn test_parse_recovers_coordinates() {
        let frame = JointFrame::new(
            0.0,
            JointMap::new()
                .with(JointName::LeftKnee, JointSample::new(0.12345, 0.98765, 0.7))
                .with(
                    JointName::Other("tailBone".to_string()),
                    JointSample::new(0.5, 0.25, 0.7),
                ),
        );
        let encoder = FeatureEncoder::default();
        let line = encoder.encode_frame(&frame, 0.0).unwrap();
        let parsed = parse_line(&line).unwrap();

        assert_eq!(parsed.joints.len(), 2);
        let (code, x, y) = &parsed.joints[0];
        assert_eq!(code, "lk");
        assert!((x - 0.12345).abs() <= 0.0005);
        assert!((y - 0.98765).abs() <= 0.0005);
        assert_eq!(parsed.joints[1].0, "tailBone");
        assert_eq!(encoder.usable_frame_count(&[frame]), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("hello").is_none());
        assert!(parse_line("t:abc|lw:0.1,0.2").is_none());
        assert!(parse_line("t:0.0|lw:0.1").is_none());
    }
}
