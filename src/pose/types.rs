//! Joint and frame types for the pose stream.
//!
//! These types carry ONLY named keypoint coordinates and confidences - never image data.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Named anatomical keypoint.
///
/// Names outside the fixed set are kept verbatim in `Other` so that
/// upstream models with extra keypoints still flow through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JointName {
    LeftWrist,
    RightWrist,
    LeftElbow,
    RightElbow,
    LeftShoulder,
    RightShoulder,
    Neck,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    Root,
    Nose,
    Other(String),
}

impl JointName {
    /// All joints of the fixed enumeration, in canonical order.
    pub const KNOWN: [JointName; 15] = [
        JointName::LeftWrist,
        JointName::RightWrist,
        JointName::LeftElbow,
        JointName::RightElbow,
        JointName::LeftShoulder,
        JointName::RightShoulder,
        JointName::Neck,
        JointName::LeftHip,
        JointName::RightHip,
        JointName::LeftKnee,
        JointName::RightKnee,
        JointName::LeftAnkle,
        JointName::RightAnkle,
        JointName::Root,
        JointName::Nose,
    ];

    /// Wire name (camelCase, as produced by the pose model).
    pub fn as_str(&self) -> &str {
        match self {
            JointName::LeftWrist => "leftWrist",
            JointName::RightWrist => "rightWrist",
            JointName::LeftElbow => "leftElbow",
            JointName::RightElbow => "rightElbow",
            JointName::LeftShoulder => "leftShoulder",
            JointName::RightShoulder => "rightShoulder",
            JointName::Neck => "neck",
            JointName::LeftHip => "leftHip",
            JointName::RightHip => "rightHip",
            JointName::LeftKnee => "leftKnee",
            JointName::RightKnee => "rightKnee",
            JointName::LeftAnkle => "leftAnkle",
            JointName::RightAnkle => "rightAnkle",
            JointName::Root => "root",
            JointName::Nose => "nose",
            JointName::Other(name) => name,
        }
    }

    /// Short code used by the feature encoder, if this joint has one.
    pub fn abbreviation(&self) -> Option<&'static str> {
        let code = match self {
            JointName::LeftWrist => "lw",
            JointName::RightWrist => "rw",
            JointName::LeftElbow => "le",
            JointName::RightElbow => "re",
            JointName::LeftShoulder => "ls",
            JointName::RightShoulder => "rs",
            JointName::Neck => "n",
            JointName::LeftHip => "lh",
            JointName::RightHip => "rh",
            JointName::LeftKnee => "lk",
            JointName::RightKnee => "rk",
            JointName::LeftAnkle => "la",
            JointName::RightAnkle => "ra",
            JointName::Root => "rt",
            JointName::Nose => "ns",
            JointName::Other(_) => return None,
        };
        Some(code)
    }
}

impl FromStr for JointName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JointName::KNOWN
            .iter()
            .find(|joint| joint.as_str() == s)
            .cloned()
            .unwrap_or_else(|| JointName::Other(s.to_string())))
    }
}

impl From<&str> for JointName {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(joint) => joint,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JointName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JointName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(JointName::from(name.as_str()))
    }
}

/// A single joint observation in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    /// Normalized X coordinate (0.0-1.0, origin top-left)
    pub x: f64,
    /// Normalized Y coordinate (0.0-1.0, origin top-left)
    pub y: f64,
    /// Detection confidence (0.0-1.0)
    pub confidence: f64,
}

impl JointSample {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    /// Whether the sample clears the given confidence threshold (strictly).
    pub fn is_usable(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }

    /// Euclidean distance to another sample in normalized units.
    pub fn distance_to(&self, other: &JointSample) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Insertion-ordered mapping from joint name to sample.
///
/// Order is significant: the encoder emits joints in the order the
/// upstream model reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointMap {
    entries: Vec<(JointName, JointSample)>,
}

impl JointMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a joint. Replacing keeps the original position.
    pub fn insert(&mut self, name: JointName, sample: JointSample) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = sample,
            None => self.entries.push((name, sample)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: JointName, sample: JointSample) -> Self {
        self.insert(name, sample);
        self
    }

    pub fn get(&self, name: &JointName) -> Option<&JointSample> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, sample)| sample)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JointName, &JointSample)> {
        self.entries.iter().map(|(n, s)| (n, s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only joints whose confidence is strictly above `threshold`.
    pub fn filtered(&self, threshold: f64) -> JointMap {
        JointMap {
            entries: self
                .entries
                .iter()
                .filter(|(_, sample)| sample.is_usable(threshold))
                .cloned()
                .collect(),
        }
    }

    /// Number of joints strictly above `threshold`.
    pub fn usable_count(&self, threshold: f64) -> usize {
        self.entries
            .iter()
            .filter(|(_, sample)| sample.is_usable(threshold))
            .count()
    }
}

impl FromIterator<(JointName, JointSample)> for JointMap {
    fn from_iter<I: IntoIterator<Item = (JointName, JointSample)>>(iter: I) -> Self {
        let mut map = JointMap::new();
        for (name, sample) in iter {
            map.insert(name, sample);
        }
        map
    }
}

impl Serialize for JointMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, sample) in &self.entries {
            map.serialize_entry(name.as_str(), sample)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JointMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct JointMapVisitor;

        impl<'de> Visitor<'de> for JointMapVisitor {
            type Value = JointMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of joint name to {x, y, confidence}")
            }

            // Entries arrive in document order, which is the order we keep.
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<JointMap, A::Error> {
                let mut map = JointMap::new();
                while let Some((name, sample)) = access.next_entry::<JointName, JointSample>()? {
                    map.insert(name, sample);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(JointMapVisitor)
    }
}

/// One timestamped, stabilized snapshot of the body. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointFrame {
    /// Monotonic capture time in seconds
    pub timestamp: f64,
    /// Joints in upstream order
    pub joints: JointMap,
}

impl JointFrame {
    pub fn new(timestamp: f64, joints: JointMap) -> Self {
        Self { timestamp, joints }
    }
}

/// A frame as delivered by the upstream pose source, before stabilization.
///
/// Same wire shape as `JointFrame`; kept distinct so raw and stabilized
/// data cannot be mixed up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub joints: JointMap,
}
