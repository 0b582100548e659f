//! Counters for streamed turns.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`StreamMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Turns started.
    pub turns_started: u64,
    /// Turns ended by sentinel or end of stream.
    pub turns_completed: u64,
    /// Turns cancelled by the caller.
    pub turns_cancelled: u64,
    /// Turns that failed.
    pub turns_failed: u64,
    /// Body chunks received.
    pub chunks_received: u64,
    /// Body bytes received.
    pub bytes_received: u64,
    /// Frames applied to turn state.
    pub frames_applied: u64,
    /// Lines that produced no frame.
    pub lines_ignored: u64,
    /// Snapshots delivered to listeners.
    pub snapshots_emitted: u64,
    /// Image payloads dropped because the body ended early.
    pub replies_discarded: u64,
}

impl MetricsSnapshot {
    /// Fraction of finished turns that completed, as a percentage.
    pub fn completion_rate(&self) -> f64 {
        let finished = self.turns_completed + self.turns_cancelled + self.turns_failed;
        if finished == 0 {
            100.0
        } else {
            (self.turns_completed as f64 / finished as f64) * 100.0
        }
    }
}

/// Lock-free counters shared by a session and its callers.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    turns_started: AtomicU64,
    turns_completed: AtomicU64,
    turns_cancelled: AtomicU64,
    turns_failed: AtomicU64,
    chunks_received: AtomicU64,
    bytes_received: AtomicU64,
    frames_applied: AtomicU64,
    lines_ignored: AtomicU64,
    snapshots_emitted: AtomicU64,
    replies_discarded: AtomicU64,
}

impl StreamMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_turn_started(&self) {
        self.turns_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_turn_completed(&self) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_turn_cancelled(&self) {
        self.turns_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_turn_failed(&self) {
        self.turns_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_chunk(&self, len: usize) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self) {
        self.frames_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored_lines(&self, count: u64) {
        self.lines_ignored.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot(&self) {
        self.snapshots_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discard(&self) {
        self.replies_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            turns_started: self.turns_started.load(Ordering::Relaxed),
            turns_completed: self.turns_completed.load(Ordering::Relaxed),
            turns_cancelled: self.turns_cancelled.load(Ordering::Relaxed),
            turns_failed: self.turns_failed.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_applied: self.frames_applied.load(Ordering::Relaxed),
            lines_ignored: self.lines_ignored.load(Ordering::Relaxed),
            snapshots_emitted: self.snapshots_emitted.load(Ordering::Relaxed),
            replies_discarded: self.replies_discarded.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.turns_started,
            &self.turns_completed,
            &self.turns_cancelled,
            &self.turns_failed,
            &self.chunks_received,
            &self.bytes_received,
            &self.frames_applied,
            &self.lines_ignored,
            &self.snapshots_emitted,
            &self.replies_discarded,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
