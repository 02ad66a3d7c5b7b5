//! Analysis layer: reasoning seam, results, prompts and the session orchestrator.

pub mod orchestrator;
pub mod prompt;
pub mod reasoning;
pub mod result;

pub use orchestrator::{
    AnalysisOrchestrator, FrameOutcome, LiveTrigger, PublishedState, SessionPhase,
};
pub use prompt::build_prompt_context;
pub use reasoning::{
    ReasoningError, ReasoningRequest, ReasoningResponse, ReasoningService, UnconfiguredReasoner,
};
pub use result::AnalysisResult;
