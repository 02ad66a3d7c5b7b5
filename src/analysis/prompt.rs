//! Prompt context for reasoning requests.
//!
//! The context explains the line format and the expected answer shape; the
//! encoded frames travel separately as the request body.

use crate::core::sampler::SampleMode;
use crate::pose::types::JointName;

/// Legend mapping short codes to joint names, e.g. `lw=leftWrist, rw=rightWrist`.
pub fn joint_legend() -> String {
    JointName::KNOWN
        .iter()
        .filter_map(|joint| joint.abbreviation().map(|code| format!("{code}={}", joint.as_str())))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the instruction text for a pass.
pub fn build_prompt_context(mode: SampleMode, exercise: Option<&str>, frame_count: usize) -> String {
    let exercise = exercise
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or("an unspecified exercise");

    let task = match mode {
        SampleMode::Live => format!(
            "You are a strength coach watching a live set of {exercise}. \
             The frames below are the last few seconds of movement. \
             Give one short, actionable cue about the current form."
        ),
        SampleMode::Full => format!(
            "You are a strength coach reviewing a complete set of {exercise}. \
             Count the completed repetitions, score the overall form, \
             and list the most important form issues in order of importance."
        ),
    };

    format!(
        "{task}\n\n\
         Data: {frame_count} frames, one per line, formatted as \
         t:<seconds since start>|<joint>:<x>,<y>|... \
         Coordinates are normalized to 0-1 with the origin at the top-left, \
         so y grows downward. Joints with low detection confidence are omitted.\n\
         Joint codes: {legend}.\n\n\
         Respond with a single JSON object and nothing else: \
         {{\"repCount\": <integer>, \"formScore\": <number 0-10>, \
         \"feedback\": <string>, \"issues\": [<string>, ...]}}",
        legend = joint_legend()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legend_covers_known_joints() {
        let legend = joint_legend();
        assert!(legend.contains("lw=leftWrist"));
        assert!(legend.contains("rt=root"));
        assert!(legend.contains("ns=nose"));
        assert_eq!(legend.split(", ").count(), JointName::KNOWN.len());
    }

    #[test]
    fn test_prompt_mentions_exercise_and_schema() {
        let prompt = build_prompt_context(SampleMode::Full, Some("squat"), 42);
        assert!(prompt.contains("squat"));
        assert!(prompt.contains("42 frames"));
        assert!(prompt.contains("\"repCount\""));
        assert!(prompt.contains("Count the completed repetitions"));
    }

    #[test]
    fn test_prompt_without_exercise() {
        let prompt = build_prompt_context(SampleMode::Live, Some("   "), 8);
        assert!(prompt.contains("an unspecified exercise"));
        assert!(prompt.contains("live set"));
    }
}
