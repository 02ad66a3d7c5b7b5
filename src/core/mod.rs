//! Core pipeline for the Synheart Form Agent.
//!
//! This module contains:
//! - Detection-loss smoothing of the raw pose stream
//! - Recent and session frame buffering
//! - Motion-adaptive frame sampling
//! - Compact text encoding for downstream analysis

pub mod buffer;
pub mod encoder;
pub mod sampler;
pub mod stability;

// Re-export commonly used types
pub use buffer::{BufferError, FrameBuffer};
pub use encoder::{abbreviate, parse_line, EncodedLine, FeatureEncoder};
pub use sampler::{movement_between, SampleMode, Sampler, SamplerConfig};
pub use stability::{StabilityEvent, StabilityOutput, StabilityStatus, StabilityTracker};
