//! Synheart Form Agent CLI
//!
//! Exercise form analysis from pose-estimation streams.

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synheart_form_agent::{
    analysis::{AnalysisOrchestrator, AnalysisResult, ReasoningService, UnconfiguredReasoner},
    config::{AnalysisConfig, Config},
    core::{FeatureEncoder, FrameBuffer, SampleMode, Sampler, SamplerConfig, StabilityTracker},
    pose::{load_recording, JointFrame, ReplaySource, SourceConfig},
    transparency::create_shared_log_with_persistence,
    DATA_DECLARATION, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synheart-form")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Exercise form analysis from pose-estimation streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Live,
    Full,
}

impl From<ModeArg> for SampleMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Live => SampleMode::Live,
            ModeArg::Full => SampleMode::Full,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a pose recording through the analysis pipeline
    Analyze {
        /// JSON-lines pose recording
        #[arg(long, short)]
        input: PathBuf,

        /// Exercise label passed to the reasoning service
        #[arg(long, short, default_value = "")]
        exercise: String,

        /// Pace frames by their timestamps instead of replaying as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Skip writing the result to the export directory
        #[arg(long)]
        no_export: bool,
    },

    /// Print the encoded text for a recording without calling any service
    Encode {
        /// JSON-lines pose recording
        #[arg(long, short)]
        input: PathBuf,

        /// Which window to encode
        #[arg(long, value_enum, default_value = "full")]
        mode: ModeArg,
    },

    /// Run the HTTP ingestion server
    #[cfg(feature = "server")]
    Serve {
        /// Port to bind (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show reasoning readiness and cumulative statistics
    Status,

    /// Display data declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            exercise,
            realtime,
            no_export,
        } => {
            cmd_analyze(&input, &exercise, realtime, !no_export);
        }
        Commands::Encode { input, mode } => {
            cmd_encode(&input, mode.into());
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            cmd_serve(port);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn load_config() -> Config {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config, using defaults: {e}");
            Config::default()
        }
    };

    if let Err(e) = config.analysis.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    config
}

fn cmd_analyze(input: &Path, exercise: &str, realtime: bool, export: bool) {
    println!("Synheart Form Agent v{VERSION}");
    println!();

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    };
    let _enter = runtime.enter();

    let reasoning = build_reasoner(&config.analysis);
    if let Err(e) = reasoning.check_ready() {
        eprintln!("Warning: {e}");
        eprintln!("Results will be neutral until a reasoning service is configured.");
    }

    println!("Replaying {input:?}");
    println!(
        "  Exercise: {}",
        if exercise.is_empty() { "(unspecified)" } else { exercise }
    );
    println!("  Pacing: {}", if realtime { "real time" } else { "fast" });
    println!("  Reasoning: {}", reasoning.name());
    println!();
    println!("Press Ctrl+C to stop early");
    println!();

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));

    let mut orchestrator = AnalysisOrchestrator::with_log(
        config.analysis.clone(),
        reasoning,
        transparency_log.clone(),
    );
    orchestrator.set_exercise((!exercise.is_empty()).then(|| exercise.to_string()));

    // Print live feedback as it is published
    let mut updates = orchestrator.subscribe();
    runtime.spawn(async move {
        let mut last_printed: Option<AnalysisResult> = None;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if let Some(live) = state.live {
                if last_printed.as_ref() == Some(&live) {
                    continue;
                }
                println!(
                    "[{}] Live: {} (score {:.1})",
                    state.updated_at.format("%H:%M:%S"),
                    live.feedback,
                    live.form_score
                );
                last_printed = Some(live);
            }
        }
    });

    let mut source = ReplaySource::new(
        input,
        SourceConfig {
            realtime,
            ..Default::default()
        },
    );
    if let Err(e) = source.start() {
        eprintln!("Error opening recording: {e}");
        std::process::exit(1);
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    orchestrator.start_new_session();
    let receiver = source.receiver().clone();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => {
                orchestrator.on_frame(&frame.joints, frame.timestamp);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if !source.is_running() && receiver.is_empty() {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                eprintln!("Pose source disconnected unexpectedly");
                break;
            }
        }
    }
    source.stop();

    println!();
    println!(
        "Analyzing {} frames...",
        orchestrator.buffer().session_len()
    );
    let result = runtime.block_on(orchestrator.finish_session(exercise));
    print_result(&result);

    if export {
        export_result(&config.export_path, exercise, &result);
    }

    if let Err(e) = transparency_log.save() {
        eprintln!("Warning: Could not save activity log: {e}");
    }

    println!();
    println!("{}", transparency_log.summary());
}

fn cmd_encode(input: &Path, mode: SampleMode) {
    let config = load_config();
    let analysis = &config.analysis;

    let frames = match load_recording(input) {
        Ok(frames) => frames,
        Err(e) => {
            eprintln!("Error reading recording: {e}");
            std::process::exit(1);
        }
    };

    let mut tracker = StabilityTracker::new(analysis.visibility_threshold, analysis.loss_timeout);
    let mut buffer = FrameBuffer::new(analysis.recent_capacity);
    for frame in &frames {
        let output = tracker.update(&frame.joints, frame.timestamp);
        if output.joints.is_empty() {
            continue;
        }
        if let Err(e) = buffer.append(JointFrame::new(frame.timestamp, output.joints)) {
            tracing::warn!("Skipping frame: {}", e);
        }
    }

    let window = match mode {
        SampleMode::Live => buffer.recent(),
        SampleMode::Full => buffer.session(),
    };
    let sampled = Sampler::new(SamplerConfig::from(analysis)).sample(&window, mode);
    let encoder = FeatureEncoder::new(analysis.encoding_threshold);
    let encoded = encoder.encode(&sampled);

    eprintln!(
        "{} raw frames, {} buffered, {} sampled, {} encoded",
        frames.len(),
        window.len(),
        sampled.len(),
        encoder.usable_frame_count(&sampled)
    );

    if encoded.is_empty() {
        eprintln!("No usable signal in recording.");
    } else {
        println!("{encoded}");
    }
}

#[cfg(feature = "server")]
fn cmd_serve(port: Option<u16>) {
    use synheart_form_agent::server::{run, ServerConfig};

    let config = load_config();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    };

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    let mut server_config = ServerConfig::from_config(&config).with_log(transparency_log.clone());
    if let Some(port) = port {
        server_config.port = port;
    }

    runtime.block_on(async {
        let reasoning = build_reasoner(&config.analysis);
        if let Err(e) = reasoning.check_ready() {
            eprintln!("Warning: {e}");
        }

        let (addr, shutdown_tx) = match run(server_config, reasoning).await {
            Ok(bound) => bound,
            Err(e) => {
                eprintln!("Error starting server: {e}");
                std::process::exit(1);
            }
        };

        println!("Listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Error waiting for Ctrl+C: {e}");
        }
        let _ = shutdown_tx.send(());
    });

    if let Err(e) = transparency_log.save() {
        eprintln!("Warning: Could not save activity log: {e}");
    }
    println!();
    println!("{}", transparency_log.summary());
}

fn cmd_status() {
    let config = load_config();

    println!("Synheart Form Agent Status");
    println!("==========================");
    println!();

    let reasoning = build_reasoner(&config.analysis);
    println!(
        "Reasoning service: {}",
        match reasoning.check_ready() {
            Ok(()) => format!("{} ✓", reasoning.name()),
            Err(e) => format!("not ready ✗ ({e})"),
        }
    );
    println!();

    println!("Configuration:");
    println!(
        "  Thresholds: visibility {:.2}, encoding {:.2}",
        config.analysis.visibility_threshold, config.analysis.encoding_threshold
    );
    println!(
        "  Live interval: {:.1}s (min {} frames)",
        config.analysis.live_interval.as_secs_f64(),
        config.analysis.min_live_frames
    );
    println!(
        "  Reasoning timeout: {:.0}s",
        config.analysis.reasoning_timeout.as_secs_f64()
    );
    println!();

    // Load and show cumulative stats if available
    let stats_path = config.data_path.join("transparency.json");
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                for (key, label) in [
                    ("frames_received", "Frames received"),
                    ("frames_buffered", "Frames buffered"),
                    ("detection_losses", "Detection losses"),
                    ("live_analyses", "Live analyses"),
                    ("full_analyses", "Full analyses"),
                    ("reasoning_failures", "Reasoning failures"),
                ] {
                    if let Some(value) = stats.get(key) {
                        println!("  {label}: {value}");
                    }
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_privacy() {
    println!("{DATA_DECLARATION}");
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn print_result(result: &AnalysisResult) {
    println!();
    println!("Result");
    println!("======");
    println!("  Reps: {}", result.rep_count);
    println!("  Form score: {:.1} / 10", result.form_score);
    if !result.feedback.is_empty() {
        println!("  Feedback: {}", result.feedback);
    }
    for issue in &result.issues {
        println!("  - {issue}");
    }
}

fn export_result(export_dir: &Path, exercise: &str, result: &AnalysisResult) {
    let export_path = export_dir.join(format!(
        "session_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));

    if let Some(parent) = export_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let payload = serde_json::json!({
        "exercise": exercise,
        "analyzed_at": Utc::now().to_rfc3339(),
        "result": result,
    });

    match serde_json::to_string_pretty(&payload) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&export_path, json) {
                eprintln!("Error writing result: {e}");
            } else {
                println!();
                println!("Exported result to {export_path:?}");
            }
        }
        Err(e) => {
            eprintln!("Error serializing result: {e}");
        }
    }
}

/// Build the reasoning service from the environment.
#[cfg(feature = "gateway")]
fn build_reasoner(analysis: &AnalysisConfig) -> Arc<dyn ReasoningService> {
    use synheart_form_agent::gateway::{GatewayClient, GatewayConfig};

    let config = GatewayConfig::from_env().with_timeout(analysis.reasoning_timeout);
    match GatewayClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => Arc::new(UnconfiguredReasoner::new(e.to_string())),
    }
}

#[cfg(not(feature = "gateway"))]
fn build_reasoner(_analysis: &AnalysisConfig) -> Arc<dyn ReasoningService> {
    Arc::new(UnconfiguredReasoner::new(
        "built without the gateway feature",
    ))
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
