//! Session lifecycle and analysis scheduling.
//!
//! The orchestrator owns the stability tracker and frame buffer, accepts
//! frames synchronously, and runs analysis passes as spawned tasks so the
//! producer is never blocked on the reasoning service:
//!
//! ```text
//! raw frame ─▶ StabilityTracker ─▶ FrameBuffer ─┬─ recent ─▶ live pass (periodic)
//!                                               └─ session ─▶ full pass (on stop)
//!
//! pass: snapshot ─▶ Sampler ─▶ FeatureEncoder ─▶ ReasoningService ─▶ AnalysisResult
//! ```
//!
//! Results are published as whole `PublishedState` values on a watch
//! channel, so observers never see a score from one pass next to feedback
//! from another.

use crate::analysis::prompt::build_prompt_context;
use crate::analysis::reasoning::{ReasoningError, ReasoningRequest, ReasoningService};
use crate::analysis::result::AnalysisResult;
use crate::config::AnalysisConfig;
use crate::core::buffer::FrameBuffer;
use crate::core::encoder::FeatureEncoder;
use crate::core::sampler::{SampleMode, Sampler, SamplerConfig};
use crate::core::stability::{StabilityEvent, StabilityStatus, StabilityTracker};
use crate::pose::types::{JointFrame, JointMap};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Recording state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Recording,
}

/// Everything a presentation layer may observe, published as one value.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedState {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    /// Frames buffered in the current session
    pub frames_in_session: usize,
    /// Latest live feedback
    pub live: Option<AnalysisResult>,
    /// End-of-session verdict
    pub final_result: Option<AnalysisResult>,
    /// A full pass for this session is running
    pub full_analysis_pending: bool,
    pub updated_at: DateTime<Utc>,
}

impl PublishedState {
    fn new(session_id: Uuid, phase: SessionPhase) -> Self {
        Self {
            session_id,
            phase,
            frames_in_session: 0,
            live: None,
            final_result: None,
            full_analysis_pending: false,
            updated_at: Utc::now(),
        }
    }
}

/// What happened to the live trigger on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveTrigger {
    /// Not recording, detection lost, not enough frames, or interval not elapsed
    NotDue,
    /// A live pass was spawned
    Started,
    /// Due, but a live pass was already in flight
    Skipped,
}

/// Per-frame report from `on_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub status: StabilityStatus,
    pub buffered: bool,
    pub detection_lost: bool,
    pub live: LiveTrigger,
}

/// Sample → encode → reason, shared by live and full passes.
struct AnalysisPipeline {
    reasoning: Arc<dyn ReasoningService>,
    sampler: Sampler,
    encoder: FeatureEncoder,
    timeout: Duration,
    log: SharedTransparencyLog,
}

impl AnalysisPipeline {
    async fn run(
        &self,
        frames: Vec<JointFrame>,
        mode: SampleMode,
        exercise: Option<String>,
    ) -> AnalysisResult {
        let sampled = self.sampler.sample(&frames, mode);
        let encoded = self.encoder.encode(&sampled);

        if encoded.is_empty() {
            debug!("No usable signal in {} frames ({:?})", frames.len(), mode);
            return match mode {
                SampleMode::Live => AnalysisResult::waiting(),
                SampleMode::Full => AnalysisResult::no_movement(),
            };
        }

        if let Err(e) = self.reasoning.check_ready() {
            warn!("Skipping {:?} analysis: {}", mode, e);
            self.log.record_reasoning_failure();
            return AnalysisResult::from_failure(&e);
        }

        let frame_count = encoded.lines().count();
        let request = ReasoningRequest {
            mode,
            prompt_context: build_prompt_context(mode, exercise.as_deref(), frame_count),
            exercise,
            encoded,
            frame_count,
        };

        debug!(
            "Sending {} frames ({} bytes) to {}",
            frame_count,
            request.encoded.len(),
            self.reasoning.name()
        );
        self.log.record_reasoning_call();

        let outcome = match tokio::time::timeout(self.timeout, self.reasoning.analyze(request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ReasoningError::Timeout {
                elapsed_ms: self.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(response) => AnalysisResult::from_response(response),
            Err(e) => {
                warn!("{:?} analysis failed: {}", mode, e);
                self.log.record_reasoning_failure();
                AnalysisResult::from_failure(&e)
            }
        }
    }
}

/// Clears the in-flight flag when a live task ends, even by panic.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns a session's buffers and schedules analysis passes.
///
/// Analysis passes are spawned with `tokio::spawn`, so `on_frame` and
/// `stop_session_and_analyze` must be called from within a Tokio runtime.
pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    tracker: StabilityTracker,
    buffer: FrameBuffer,
    pipeline: Arc<AnalysisPipeline>,
    phase: SessionPhase,
    session_id: Uuid,
    exercise: Option<String>,
    /// Frame time of the last started live pass
    last_live_at: Option<f64>,
    live_in_flight: Arc<AtomicBool>,
    /// Serializes full passes
    full_gate: Arc<Mutex<()>>,
    state_tx: Arc<watch::Sender<PublishedState>>,
    log: SharedTransparencyLog,
}

impl AnalysisOrchestrator {
    /// Create an idle orchestrator.
    pub fn new(config: AnalysisConfig, reasoning: Arc<dyn ReasoningService>) -> Self {
        Self::with_log(config, reasoning, create_shared_log())
    }

    /// Create an idle orchestrator that reports into an existing activity log.
    pub fn with_log(
        config: AnalysisConfig,
        reasoning: Arc<dyn ReasoningService>,
        log: SharedTransparencyLog,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let (state_tx, _) = watch::channel(PublishedState::new(session_id, SessionPhase::Idle));

        let pipeline = AnalysisPipeline {
            reasoning,
            sampler: Sampler::new(SamplerConfig::from(&config)),
            encoder: FeatureEncoder::new(config.encoding_threshold),
            timeout: config.reasoning_timeout,
            log: log.clone(),
        };

        Self {
            tracker: StabilityTracker::new(config.visibility_threshold, config.loss_timeout),
            buffer: FrameBuffer::new(config.recent_capacity),
            pipeline: Arc::new(pipeline),
            phase: SessionPhase::Idle,
            session_id,
            exercise: None,
            last_live_at: None,
            live_in_flight: Arc::new(AtomicBool::new(false)),
            full_gate: Arc::new(Mutex::new(())),
            state_tx: Arc::new(state_tx),
            log,
            config,
        }
    }

    /// Exercise label used for live passes.
    pub fn set_exercise(&mut self, exercise: Option<String>) {
        self.exercise = exercise;
    }

    /// Reset buffers and published results and start recording.
    ///
    /// Calling this while already recording starts a fresh session.
    pub fn start_new_session(&mut self) -> Uuid {
        if self.phase == SessionPhase::Recording {
            info!("Restarting session {}", self.session_id);
        }

        self.buffer.reset();
        self.tracker.reset();
        self.last_live_at = None;
        self.phase = SessionPhase::Recording;
        self.session_id = Uuid::new_v4();
        self.state_tx
            .send_replace(PublishedState::new(self.session_id, SessionPhase::Recording));

        info!("Session {} started", self.session_id);
        self.session_id
    }

    /// Ingest one raw frame. Never waits on the reasoning service.
    ///
    /// Frames are buffered in any phase; live passes only run while recording.
    pub fn on_frame(&mut self, raw_joints: &JointMap, now: f64) -> FrameOutcome {
        self.log.record_frame_received();

        let output = self.tracker.update(raw_joints, now);
        let detection_lost = output.event == Some(StabilityEvent::DetectionLost);
        if detection_lost {
            info!("Detection lost at t={:.2}", now);
            self.log.record_detection_loss();
        }
        if output.status == StabilityStatus::Holding {
            self.log.record_frame_held();
        }

        let buffered = if output.joints.is_empty() {
            self.log.record_frame_dropped();
            false
        } else {
            match self.buffer.append(JointFrame::new(now, output.joints)) {
                Ok(()) => {
                    self.log.record_frame_buffered();
                    true
                }
                Err(e) => {
                    warn!("Dropping frame: {}", e);
                    self.log.record_frame_dropped();
                    false
                }
            }
        };

        if buffered {
            let frames = self.buffer.session_len();
            // Silent update: a frame count alone is not worth waking observers.
            self.state_tx.send_if_modified(|state| {
                state.frames_in_session = frames;
                false
            });
        }

        // No live passes while nobody is in frame; the recent window is stale.
        let live = if self.phase == SessionPhase::Recording
            && output.status != StabilityStatus::Lost
        {
            self.maybe_start_live(now)
        } else {
            LiveTrigger::NotDue
        };

        FrameOutcome {
            status: output.status,
            buffered,
            detection_lost,
            live,
        }
    }

    fn maybe_start_live(&mut self, now: f64) -> LiveTrigger {
        if self.buffer.recent_len() < self.config.min_live_frames {
            return LiveTrigger::NotDue;
        }
        if let Some(last) = self.last_live_at {
            if now - last < self.config.live_interval.as_secs_f64() {
                return LiveTrigger::NotDue;
            }
        }
        if self
            .live_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Live analysis still in flight; skipping trigger at t={:.2}", now);
            self.log.record_live_skipped();
            return LiveTrigger::Skipped;
        }

        self.last_live_at = Some(now);
        self.log.record_live_analysis();

        let guard = InFlightGuard(self.live_in_flight.clone());
        let frames = self.buffer.recent();
        let pipeline = self.pipeline.clone();
        let state_tx = self.state_tx.clone();
        let session_id = self.session_id;
        let exercise = self.exercise.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let result = pipeline.run(frames, SampleMode::Live, exercise).await;
            let published = state_tx.send_if_modified(|state| {
                if state.session_id != session_id {
                    return false;
                }
                state.live = Some(result);
                state.updated_at = Utc::now();
                true
            });
            if !published {
                debug!("Discarding live result for ended session {}", session_id);
            }
        });

        LiveTrigger::Started
    }

    /// Stop recording and run the full analysis over the session buffer.
    ///
    /// The returned handle always resolves to a result. Full passes run one
    /// at a time; a second stop waits for the first to finish.
    pub fn stop_session_and_analyze(&mut self, exercise_label: &str) -> JoinHandle<AnalysisResult> {
        if self.phase == SessionPhase::Idle {
            warn!("Stop requested while idle; analyzing buffered frames");
        }
        self.phase = SessionPhase::Idle;

        let frames = self.buffer.session();
        let session_id = self.session_id;
        info!(
            "Session {} stopped with {} frames ({:.1}s)",
            session_id,
            frames.len(),
            self.buffer.session_duration_secs()
        );

        self.state_tx.send_modify(|state| {
            state.phase = SessionPhase::Idle;
            state.full_analysis_pending = true;
            state.updated_at = Utc::now();
        });
        self.log.record_full_analysis();

        let pipeline = self.pipeline.clone();
        let gate = self.full_gate.clone();
        let state_tx = self.state_tx.clone();
        let label = exercise_label.trim().to_string();

        tokio::spawn(async move {
            let _permit = gate.lock().await;
            let exercise = (!label.is_empty()).then_some(label);
            let result = pipeline.run(frames, SampleMode::Full, exercise).await;

            info!(
                "Full analysis for {}: {} reps, score {:.1}",
                session_id, result.rep_count, result.form_score
            );

            let published = result.clone();
            state_tx.send_if_modified(move |state| {
                if state.session_id != session_id {
                    return false;
                }
                state.final_result = Some(published);
                state.full_analysis_pending = false;
                state.updated_at = Utc::now();
                true
            });
            result
        })
    }

    /// Stop, run the full analysis, and wait for its result.
    pub async fn finish_session(&mut self, exercise_label: &str) -> AnalysisResult {
        match self.stop_session_and_analyze(exercise_label).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Full analysis task failed: {}", e);
                AnalysisResult::interrupted(&e.to_string())
            }
        }
    }

    /// Watch published state changes.
    pub fn subscribe(&self) -> watch::Receiver<PublishedState> {
        self.state_tx.subscribe()
    }

    /// Current published state.
    pub fn published(&self) -> PublishedState {
        self.state_tx.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn log(&self) -> &SharedTransparencyLog {
        &self.log
    }

    /// Whether a live pass is currently running.
    pub fn live_in_flight(&self) -> bool {
        self.live_in_flight.load(Ordering::SeqCst)
    }
}
