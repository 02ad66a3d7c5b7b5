//! Pose stream input for the form agent.
//!
//! The pose-estimation model itself lives upstream; this module defines the
//! joint/frame data model it delivers and a replay source for recordings.

pub mod source;
pub mod types;

// Re-export commonly used types
pub use source::{load_recording, read_frames, ReplaySource, SourceConfig, SourceError};
pub use types::{JointFrame, JointMap, JointName, JointSample, RawFrame};
