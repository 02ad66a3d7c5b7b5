//! Demonstration of the Synheart Form Agent analysis pipeline.
//!
//! This example shows how to:
//! 1. Plug a reasoning service into the orchestrator
//! 2. Feed a (synthetic) pose stream, including a short detection dropout
//! 3. Watch live feedback as it is published
//! 4. Run the end-of-session analysis
//!
//! Run with: cargo run --example replay_demo
//!
//! The reasoning service here is an offline heuristic that decodes the
//! encoded lines and counts hip dips, so no API key is needed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use synheart_form_agent::{
    analysis::{
        AnalysisOrchestrator, ReasoningError, ReasoningRequest, ReasoningResponse,
        ReasoningService,
    },
    config::AnalysisConfig,
    core::parse_line,
    pose::{JointMap, JointName, JointSample},
    DATA_DECLARATION,
};

/// Counts squat reps from left-hip depth in the encoded text.
struct HipDipCounter;

#[async_trait]
impl ReasoningService for HipDipCounter {
    async fn analyze(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasoningError> {
        let depths: Vec<f64> = request
            .encoded
            .lines()
            .filter_map(parse_line)
            .filter_map(|line| {
                line.joints
                    .into_iter()
                    .find(|(code, _, _)| code == "lh")
                    .map(|(_, _, y)| y)
            })
            .collect();

        if depths.is_empty() {
            return Err(ReasoningError::Format("no hip positions in input".to_string()));
        }

        // y grows downward: a rep is a descent below 0.65 followed by a return above 0.55
        let mut reps = 0;
        let mut down = false;
        for y in &depths {
            if !down && *y > 0.65 {
                down = true;
            } else if down && *y < 0.55 {
                down = false;
                reps += 1;
            }
        }

        let deepest = depths.iter().cloned().fold(f64::MIN, f64::max);
        let mut issues = Vec::new();
        if deepest < 0.7 {
            issues.push("squat depth is shallow".to_string());
        }

        Ok(ReasoningResponse {
            rep_count: Some(reps),
            form_score: Some(if issues.is_empty() { 8.0 } else { 6.0 }),
            feedback: Some(format!("{reps} reps so far, keep the tempo steady")),
            issues: Some(issues),
        })
    }

    fn name(&self) -> &str {
        "hip-dip-counter"
    }
}

/// Synthetic squat pose at time `t` (one rep every 2 seconds).
fn squat_pose(t: f64) -> JointMap {
    let phase = (t * std::f64::consts::PI).sin().abs();
    let hip_y = 0.5 + 0.25 * phase;
    let knee_y = 0.7 + 0.05 * phase;

    JointMap::new()
        .with(JointName::LeftShoulder, JointSample::new(0.42, hip_y - 0.25, 0.95))
        .with(JointName::RightShoulder, JointSample::new(0.58, hip_y - 0.25, 0.95))
        .with(JointName::LeftWrist, JointSample::new(0.40, hip_y - 0.05, 0.9))
        .with(JointName::RightWrist, JointSample::new(0.60, hip_y - 0.05, 0.9))
        .with(JointName::LeftHip, JointSample::new(0.45, hip_y, 0.9))
        .with(JointName::RightHip, JointSample::new(0.55, hip_y, 0.9))
        .with(JointName::LeftKnee, JointSample::new(0.44, knee_y, 0.85))
        .with(JointName::RightKnee, JointSample::new(0.56, knee_y, 0.85))
}

#[tokio::main]
async fn main() {
    println!("Synheart Form Agent - Replay Demo");
    println!("=================================");
    println!();
    println!("{DATA_DECLARATION}");
    println!();

    let mut orchestrator =
        AnalysisOrchestrator::new(AnalysisConfig::default(), Arc::new(HipDipCounter));
    orchestrator.set_exercise(Some("squat".to_string()));

    let mut updates = orchestrator.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if let Some(live) = state.live {
                println!("  [live] {} (score {:.1})", live.feedback, live.form_score);
            }
        }
    });

    let session_id = orchestrator.start_new_session();
    println!("Session {session_id} started");
    println!("Streaming 12 seconds of squats at 10 fps...");
    println!();

    for i in 0..120 {
        let t = i as f64 * 0.1;
        // Person steps out of frame for half a second
        let joints = if (5.0..5.5).contains(&t) {
            JointMap::new()
        } else {
            squat_pose(t)
        };

        let outcome = orchestrator.on_frame(&joints, t);
        if outcome.detection_lost {
            println!("  [t={t:.1}] detection lost");
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!();
    println!("Stopping session and running full analysis...");
    let result = orchestrator.finish_session("squat").await;

    println!();
    println!("Result:");
    println!("  Reps: {}", result.rep_count);
    println!("  Form score: {:.1}", result.form_score);
    println!("  Feedback: {}", result.feedback);
    for issue in &result.issues {
        println!("  - {issue}");
    }

    println!();
    println!("{}", orchestrator.log().summary());
}
