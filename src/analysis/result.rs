//! Analysis results and their well-formed fallbacks.

use crate::analysis::reasoning::{ReasoningError, ReasoningResponse};
use serde::{Deserialize, Serialize};

/// Neutral score used whenever the service gives no usable score.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// Upper bound of the form score scale.
pub const MAX_SCORE: f64 = 10.0;

/// Verdict for a live or full analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Completed repetitions (never negative)
    pub rep_count: u32,
    /// Form quality, 0-10
    pub form_score: f64,
    /// Coaching feedback
    pub feedback: String,
    /// Specific problems, in order of importance
    pub issues: Vec<String>,
}

impl AnalysisResult {
    /// Sentinel for a live pass with nothing to analyze yet.
    pub fn waiting() -> Self {
        Self {
            rep_count: 0,
            form_score: NEUTRAL_SCORE,
            feedback: "Waiting for movement - no usable pose data yet".to_string(),
            issues: Vec::new(),
        }
    }

    /// Sentinel for a full pass over a session with no usable frames.
    pub fn no_movement() -> Self {
        Self {
            rep_count: 0,
            form_score: NEUTRAL_SCORE,
            feedback: "No movement data recorded in this session".to_string(),
            issues: Vec::new(),
        }
    }

    /// Map a best-effort service response, defaulting anything missing.
    pub fn from_response(response: ReasoningResponse) -> Self {
        let form_score = response
            .form_score
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(0.0, MAX_SCORE))
            .unwrap_or(NEUTRAL_SCORE);

        let rep_count = response
            .rep_count
            .map(|reps| reps.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0);

        let issues = response
            .issues
            .unwrap_or_default()
            .into_iter()
            .map(|issue| issue.trim().to_string())
            .filter(|issue| !issue.is_empty())
            .collect();

        Self {
            rep_count,
            form_score,
            feedback: response.feedback.unwrap_or_default().trim().to_string(),
            issues,
        }
    }

    /// Neutral result explaining why the service could not be used.
    pub fn from_failure(error: &ReasoningError) -> Self {
        let feedback = match error {
            ReasoningError::Configuration(_) => {
                "Analysis unavailable: the reasoning service is not configured".to_string()
            }
            ReasoningError::Connection(_)
            | ReasoningError::Timeout { .. }
            | ReasoningError::Server { .. } => {
                "Analysis unavailable: could not reach the reasoning service".to_string()
            }
            ReasoningError::Format(_) => {
                "Analysis unavailable: the reasoning service returned an unreadable response"
                    .to_string()
            }
        };

        Self {
            rep_count: 0,
            form_score: NEUTRAL_SCORE,
            feedback,
            issues: vec![format!("{}: {}", error.category(), error)],
        }
    }

    /// Neutral result for a pass that never completed (task aborted or panicked).
    pub fn interrupted(reason: &str) -> Self {
        Self {
            rep_count: 0,
            form_score: NEUTRAL_SCORE,
            feedback: "Analysis was interrupted before it finished".to_string(),
            issues: vec![format!("internal: {reason}")],
        }
    }
}
