//! Transparency module for the Synheart Form Agent.
//!
//! This module provides tools for tracking and exposing what the agent
//! did with the pose stream, supporting user trust.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
