//! Synheart Form Agent - exercise form analysis from pose-estimation streams.
//!
//! This library turns a stream of 2D body-joint frames into coaching
//! feedback: a rep count, a form score and a list of issues. Frames are
//! stabilized, buffered, sampled and encoded into a compact text format
//! that an external reasoning service evaluates.
//!
//! # Data Guarantees
//!
//! - **No images**: Only joint coordinates and confidences enter the pipeline
//! - **Bounded retention**: Frames live in memory for the current session only
//! - **Transparency**: All pipeline activity is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Synheart Form Agent                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │ Pose Source │──▶│  Stability  │──▶│   Frame     │             │
//! │  │ (replay/API)│   │  Tracker    │   │   Buffer    │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │                                            │                      │
//! │                                            ▼                      │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │  Reasoning  │◀──│  Feature    │◀──│  Sampler    │             │
//! │  │  Service    │   │  Encoder    │   │ (adaptive)  │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │         │                                                         │
//! │         ▼                                                         │
//! │  ┌─────────────┐                     ┌─────────────┐             │
//! │  │  Published  │                     │Transparency │             │
//! │  │   State     │                     │    Log      │             │
//! │  └─────────────┘                     └─────────────┘             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use synheart_form_agent::analysis::{AnalysisOrchestrator, UnconfiguredReasoner};
//! use synheart_form_agent::config::AnalysisConfig;
//! use synheart_form_agent::pose::{JointMap, JointName, JointSample};
//!
//! # async fn demo() {
//! let reasoning = Arc::new(UnconfiguredReasoner::new("no service configured"));
//! let mut orchestrator = AnalysisOrchestrator::new(AnalysisConfig::default(), reasoning);
//!
//! orchestrator.start_new_session();
//! let joints = JointMap::new().with(JointName::LeftWrist, JointSample::new(0.4, 0.5, 0.9));
//! orchestrator.on_frame(&joints, 0.0);
//!
//! let result = orchestrator.finish_session("squat").await;
//! println!("{} reps, score {:.1}", result.rep_count, result.form_score);
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod pose;
pub mod transparency;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use analysis::{
    AnalysisOrchestrator, AnalysisResult, PublishedState, ReasoningError, ReasoningService,
    SessionPhase, UnconfiguredReasoner,
};
pub use config::{AnalysisConfig, Config};
pub use core::{FeatureEncoder, FrameBuffer, SampleMode, Sampler, StabilityTracker};
pub use pose::{JointFrame, JointMap, JointName, JointSample, RawFrame, ReplaySource};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

// Gateway re-exports (when enabled)
#[cfg(feature = "gateway")]
pub use gateway::{GatewayClient, GatewayConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data declaration that can be displayed to users.
pub const DATA_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            SYNHEART FORM AGENT - DATA DECLARATION                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent analyzes exercise form from body-joint positions.    ║
║                                                                  ║
║  ✓ WHAT WE PROCESS:                                              ║
║    • 2D joint coordinates (wrists, elbows, shoulders, ...)       ║
║    • Per-joint detection confidence                              ║
║    • Frame timestamps                                            ║
║                                                                  ║
║  ✗ WHAT WE NEVER PROCESS:                                        ║
║    • Camera images or video                                      ║
║    • Faces or any identifying appearance                         ║
║    • Anything about your surroundings                            ║
║                                                                  ║
║  Encoded joint positions are sent to the configured reasoning    ║
║  service for analysis. Frames are kept in memory only for the    ║
║  current session; only results and counters are saved.           ║
║                                                                  ║
║  You can view pipeline statistics anytime with:                  ║
║    synheart-form status                                          ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_declaration_contents() {
        assert!(DATA_DECLARATION.contains("DATA DECLARATION"));
        assert!(DATA_DECLARATION.contains("NEVER PROCESS"));
        assert!(DATA_DECLARATION.contains("Camera images"));
    }
}
