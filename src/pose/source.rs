//! Replay of recorded pose streams.
//!
//! Stands in for the live camera/pose pipeline: a background thread reads a
//! JSON-lines recording and delivers `RawFrame`s over a bounded channel,
//! optionally paced by the recorded timestamps.

use crate::pose::types::RawFrame;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for a replay source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Sleep between frames according to recorded timestamps
    pub realtime: bool,
    /// Channel capacity; the reader blocks when the consumer falls behind
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            realtime: false,
            channel_capacity: 1_024,
        }
    }
}

/// Errors that can occur while replaying a recording.
#[derive(Debug)]
pub enum SourceError {
    AlreadyRunning,
    Io(String),
    Parse { line: usize, message: String },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::AlreadyRunning => write!(f, "Source is already running"),
            SourceError::Io(e) => write!(f, "IO error: {e}"),
            SourceError::Parse { line, message } => {
                write!(f, "Parse error on line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// Parse one recording line. Blank lines yield `None`.
pub fn parse_frame_line(line: &str, line_no: usize) -> Result<Option<RawFrame>, SourceError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| SourceError::Parse {
            line: line_no,
            message: e.to_string(),
        })
}

/// Read every frame from a JSON-lines reader, skipping malformed lines.
pub fn read_frames<R: Read>(reader: R) -> Result<Vec<RawFrame>, SourceError> {
    let mut frames = Vec::new();
    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(|e| SourceError::Io(e.to_string()))?;
        match parse_frame_line(&line, idx + 1) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping frame: {}", e),
        }
    }
    Ok(frames)
}

/// Load a recording from disk.
pub fn load_recording(path: &Path) -> Result<Vec<RawFrame>, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| SourceError::Io(e.to_string()))?;
    read_frames(file)
}

/// A source that replays a recorded pose stream from a file.
pub struct ReplaySource {
    path: PathBuf,
    config: SourceConfig,
    sender: Sender<RawFrame>,
    receiver: Receiver<RawFrame>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Create a new replay source for the given recording.
    pub fn new(path: impl Into<PathBuf>, config: SourceConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity.max(1));
        Self {
            path: path.into(),
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start replaying frames on a background thread.
    ///
    /// The file is opened before the thread starts so that a missing
    /// recording is reported here rather than as a silent empty stream.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }

        let file = std::fs::File::open(&self.path).map_err(|e| SourceError::Io(e.to_string()))?;
        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let realtime = self.config.realtime;

        self.worker = Some(thread::spawn(move || {
            let mut previous: Option<f64> = None;
            for (idx, line) in BufReader::new(file).lines().enumerate() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("Recording read failed: {}", e);
                        break;
                    }
                };
                let frame = match parse_frame_line(&line, idx + 1) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!("Skipping frame: {}", e);
                        continue;
                    }
                };

                if realtime {
                    if let Some(prev) = previous {
                        let gap = frame.timestamp - prev;
                        if gap > 0.0 {
                            thread::sleep(Duration::from_secs_f64(gap.min(5.0)));
                        }
                    }
                    previous = Some(frame.timestamp);
                }

                if sender.send(frame).is_err() {
                    break;
                }
            }
            running.store(false, Ordering::SeqCst);
            tracing::debug!("Replay finished");
        }));

        Ok(())
    }

    /// Stop replaying. Frames already queued stay in the channel.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the reader thread is still producing frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for replayed frames.
    pub fn receiver(&self) -> &Receiver<RawFrame> {
        &self.receiver
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&self) -> Option<RawFrame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
        // Unblock a reader stuck on a full channel before joining.
        while self.receiver.try_recv().is_ok() {}
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::types::JointName;
    use std::io::Write;

    const RECORDING: &str = r#"{"timestamp": 0.0, "joints": {"leftWrist": {"x": 0.2, "y": 0.5, "confidence": 0.9}}}

not json
{"timestamp": 0.1, "joints": {}}
"#;

    #[test]
    fn test_read_frames_skips_bad_lines() {
        let frames = read_frames(RECORDING.as_bytes()).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].joints.get(&JointName::LeftWrist).is_some());
        assert!(frames[1].joints.is_empty());
    }

    #[test]
    fn test_parse_error_reports_line() {
        match parse_frame_line("{oops", 7) {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 7),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_replay_source_delivers_frames() {
        let path = std::env::temp_dir().join(format!(
            "synheart-form-replay-{}.jsonl",
            uuid::Uuid::new_v4()
        ));
        std::fs::File::create(&path)
            .and_then(|mut f| f.write_all(RECORDING.as_bytes()))
            .unwrap();

        let mut source = ReplaySource::new(&path, SourceConfig::default());
        source.start().unwrap();

        let receiver = source.receiver().clone();
        let first = receiver.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = receiver.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.timestamp, 0.0);
        assert_eq!(second.timestamp, 0.1);

        drop(source);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_recording_fails_on_start() {
        let mut source = ReplaySource::new("/nonexistent/recording.jsonl", SourceConfig::default());
        assert!(matches!(source.start(), Err(SourceError::Io(_))));
        assert!(!source.is_running());
    }
}
