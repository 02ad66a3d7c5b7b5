//! Session frame buffering.
//!
//! Every stabilized frame lands in two windows: a bounded recent window
//! that feeds live feedback, and an unbounded session window that feeds
//! the end-of-session analysis.

use crate::pose::types::JointFrame;
use std::collections::VecDeque;

/// Errors raised when appending frames.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferError {
    /// Frame is older than the newest buffered frame
    OutOfOrder { timestamp: f64, last: f64 },
    /// Timestamp is NaN or infinite
    InvalidTimestamp(f64),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::OutOfOrder { timestamp, last } => write!(
                f,
                "Frame at t={timestamp:.3} arrived after frame at t={last:.3}"
            ),
            BufferError::InvalidTimestamp(timestamp) => {
                write!(f, "Frame timestamp {timestamp} is not finite")
            }
        }
    }
}

impl std::error::Error for BufferError {}

/// Recent + session windows of stabilized frames.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Maximum recent window size
    capacity: usize,
    /// Oldest-first recent window
    recent: VecDeque<JointFrame>,
    /// All frames since the last reset
    session: Vec<JointFrame>,
}

impl FrameBuffer {
    /// Create a buffer whose recent window holds at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
            session: Vec::new(),
        }
    }

    /// Append a frame to both windows, evicting the oldest recent frame on overflow.
    pub fn append(&mut self, frame: JointFrame) -> Result<(), BufferError> {
        if !frame.timestamp.is_finite() {
            return Err(BufferError::InvalidTimestamp(frame.timestamp));
        }
        if let Some(last) = self.session.last() {
            if frame.timestamp < last.timestamp {
                return Err(BufferError::OutOfOrder {
                    timestamp: frame.timestamp,
                    last: last.timestamp,
                });
            }
        }

        self.recent.push_back(frame.clone());
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
        self.session.push(frame);
        Ok(())
    }

    /// Clear both windows.
    pub fn reset(&mut self) {
        self.recent.clear();
        self.session.clear();
    }

    /// Snapshot of the recent window, oldest first.
    pub fn recent(&self) -> Vec<JointFrame> {
        self.recent.iter().cloned().collect()
    }

    /// Snapshot of the session window.
    pub fn session(&self) -> Vec<JointFrame> {
        self.session.clone()
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn session_len(&self) -> usize {
        self.session.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Time spanned by the session window in seconds.
    pub fn session_duration_secs(&self) -> f64 {
        match (self.session.first(), self.session.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::types::{JointMap, JointName, JointSample};

    fn frame(t: f64) -> JointFrame {
        JointFrame::new(
            t,
            JointMap::new().with(JointName::Neck, JointSample::new(0.5, 0.3, 0.9)),
        )
    }

    #[test]
    fn test_recent_window_is_bounded() {
        let mut buffer = FrameBuffer::new(15);
        for i in 0..100 {
            buffer.append(frame(i as f64 * 0.1)).unwrap();
            assert!(buffer.recent_len() <= 15);
        }
        assert_eq!(buffer.session_len(), 100);

        let recent = buffer.recent();
        assert_eq!(recent.len(), 15);
        assert_eq!(recent[0].timestamp, 85.0 * 0.1);
        assert_eq!(recent[14].timestamp, 99.0 * 0.1);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut buffer = FrameBuffer::new(5);
        buffer.append(frame(1.0)).unwrap();
        buffer.append(frame(1.0)).unwrap();
        let err = buffer.append(frame(0.5)).unwrap_err();
        assert!(matches!(err, BufferError::OutOfOrder { .. }));
        assert_eq!(buffer.session_len(), 2);
        assert_eq!(buffer.recent_len(), 2);
    }

    #[test]
    fn test_non_finite_timestamp_rejected() {
        let mut buffer = FrameBuffer::new(5);
        buffer.append(frame(1.0)).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                buffer.append(frame(bad)),
                Err(BufferError::InvalidTimestamp(_))
            ));
        }
        assert_eq!(buffer.session_len(), 1);

        // Ordering still enforced after the rejected frames
        assert!(matches!(
            buffer.append(frame(0.5)),
            Err(BufferError::OutOfOrder { .. })
        ));
        assert!(buffer.append(frame(2.0)).is_ok());
    }

    #[test]
    fn test_reset_clears_both_windows() {
        let mut buffer = FrameBuffer::new(5);
        for i in 0..8 {
            buffer.append(frame(i as f64)).unwrap();
        }
        assert_eq!(buffer.session_duration_secs(), 7.0);
        buffer.reset();
        assert_eq!(buffer.recent_len(), 0);
        assert_eq!(buffer.session_len(), 0);
        assert_eq!(buffer.session_duration_secs(), 0.0);

        // Earlier timestamps are fine after a reset
        assert!(buffer.append(frame(0.0)).is_ok());
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut buffer = FrameBuffer::new(5);
        buffer.append(frame(0.0)).unwrap();
        let snapshot = buffer.session();
        buffer.append(frame(1.0)).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(buffer.session().len(), 2);
    }
}
