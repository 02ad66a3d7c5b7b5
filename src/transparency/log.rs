//! Activity log for the form agent.
//!
//! This module tracks and exposes counts of what the pipeline did with the
//! pose stream, without storing any pose data itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pipeline activity counters.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Raw frames handed to the orchestrator
    frames_received: AtomicU64,
    /// Frames appended to the session buffer
    frames_buffered: AtomicU64,
    /// Frames bridged with the last good pose
    frames_held: AtomicU64,
    /// Frames discarded (no usable joints or out of order)
    frames_dropped: AtomicU64,
    /// Detection-loss episodes
    detection_losses: AtomicU64,
    /// Live passes started
    live_analyses: AtomicU64,
    /// Live passes skipped because one was in flight
    live_skipped: AtomicU64,
    /// Full passes started
    full_analyses: AtomicU64,
    /// Calls made to the reasoning service
    reasoning_calls: AtomicU64,
    /// Reasoning calls that failed
    reasoning_failures: AtomicU64,
    /// Log start time
    started_at: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new activity log.
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_buffered: AtomicU64::new(0),
            frames_held: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            detection_losses: AtomicU64::new(0),
            live_analyses: AtomicU64::new(0),
            live_skipped: AtomicU64::new(0),
            full_analyses: AtomicU64::new(0),
            reasoning_calls: AtomicU64::new(0),
            reasoning_failures: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an activity log that accumulates across runs.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous activity stats: {}", e);
        }

        log
    }

    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_buffered(&self) {
        self.frames_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_held(&self) {
        self.frames_held.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_loss(&self) {
        self.detection_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_live_analysis(&self) {
        self.live_analyses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_live_skipped(&self) {
        self.live_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_full_analysis(&self) {
        self.full_analyses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reasoning_call(&self) {
        self.reasoning_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reasoning_failure(&self) {
        self.reasoning_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_buffered: self.frames_buffered.load(Ordering::Relaxed),
            frames_held: self.frames_held.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            detection_losses: self.detection_losses.load(Ordering::Relaxed),
            live_analyses: self.live_analyses.load(Ordering::Relaxed),
            live_skipped: self.live_skipped.load(Ordering::Relaxed),
            full_analyses: self.full_analyses.load(Ordering::Relaxed),
            reasoning_calls: self.reasoning_calls.load(Ordering::Relaxed),
            reasoning_failures: self.reasoning_failures.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames received: {}\n\
             - Frames buffered: {} ({} held, {} dropped)\n\
             - Detection losses: {}\n\
             - Live analyses: {} ({} skipped while busy)\n\
             - Full analyses: {}\n\
             - Reasoning calls: {} ({} failed)\n\
             - Uptime: {} seconds\n\
             \n\
             Data Guarantee:\n\
             - No images captured\n\
             - Only joint coordinates and confidences processed",
            stats.frames_received,
            stats.frames_buffered,
            stats.frames_held,
            stats.frames_dropped,
            stats.detection_losses,
            stats.live_analyses,
            stats.live_skipped,
            stats.full_analyses,
            stats.reasoning_calls,
            stats.reasoning_failures,
            stats.uptime_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_received: stats.frames_received,
                frames_buffered: stats.frames_buffered,
                detection_losses: stats.detection_losses,
                live_analyses: stats.live_analyses,
                full_analyses: stats.full_analyses,
                reasoning_failures: stats.reasoning_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_received
                    .store(persisted.frames_received, Ordering::Relaxed);
                self.frames_buffered
                    .store(persisted.frames_buffered, Ordering::Relaxed);
                self.detection_losses
                    .store(persisted.detection_losses, Ordering::Relaxed);
                self.live_analyses
                    .store(persisted.live_analyses, Ordering::Relaxed);
                self.full_analyses
                    .store(persisted.full_analyses, Ordering::Relaxed);
                self.reasoning_failures
                    .store(persisted.reasoning_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.frames_received,
            &self.frames_buffered,
            &self.frames_held,
            &self.frames_dropped,
            &self.detection_losses,
            &self.live_analyses,
            &self.live_skipped,
            &self.full_analyses,
            &self.reasoning_calls,
            &self.reasoning_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub frames_received: u64,
    pub frames_buffered: u64,
    pub frames_held: u64,
    pub frames_dropped: u64,
    pub detection_losses: u64,
    pub live_analyses: u64,
    pub live_skipped: u64,
    pub full_analyses: u64,
    pub reasoning_calls: u64,
    pub reasoning_failures: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Stats format for persistence (cumulative counters only).
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_received: u64,
    frames_buffered: u64,
    detection_losses: u64,
    live_analyses: u64,
    full_analyses: u64,
    reasoning_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared activity log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared activity log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
