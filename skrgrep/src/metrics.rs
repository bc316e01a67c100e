use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters shared by all workers of a grep session
#[derive(Debug, Clone)]
pub struct GrepMetrics {
    // File counters
    files_searched: Arc<AtomicU64>,
    files_failed: Arc<AtomicU64>,
    files_replaced: Arc<AtomicU64>,

    // Volume counters
    lines_scanned: Arc<AtomicU64>,
    bytes_decoded: Arc<AtomicU64>,
    continuation_lines: Arc<AtomicU64>,
}

impl GrepMetrics {
    /// Creates a new GrepMetrics instance
    pub fn new() -> Self {
        Self {
            files_searched: Arc::new(AtomicU64::new(0)),
            files_failed: Arc::new(AtomicU64::new(0)),
            files_replaced: Arc::new(AtomicU64::new(0)),
            lines_scanned: Arc::new(AtomicU64::new(0)),
            bytes_decoded: Arc::new(AtomicU64::new(0)),
            continuation_lines: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a file that was opened and decoded
    pub fn record_file(&self, bytes: u64) {
        self.files_searched.fetch_add(1, Ordering::Relaxed);
        let total = self.bytes_decoded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        debug!("File decoded: {} bytes, total: {} bytes", bytes, total);
    }

    /// Records a file that could not be processed
    pub fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file rewritten by replace
    pub fn record_replace(&self) {
        self.files_replaced.fetch_add(1, Ordering::Relaxed);
    }

    /// Records lines read by the line loop and lines borrowed by matches
    pub fn record_lines(&self, scanned: u64, borrowed: u64) {
        self.lines_scanned.fetch_add(scanned, Ordering::Relaxed);
        if borrowed > 0 {
            self.continuation_lines
                .fetch_add(borrowed, Ordering::Relaxed);
        }
    }

    /// Gets current statistics
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_searched: self.files_searched.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_replaced: self.files_replaced.load(Ordering::Relaxed),
            lines_scanned: self.lines_scanned.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            continuation_lines: self.continuation_lines.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Grep stats:\n\
             Files searched/failed/replaced: {}/{}/{}\n\
             Lines scanned: {}\n\
             Bytes decoded: {}\n\
             Continuation lines: {}",
            stats.files_searched,
            stats.files_failed,
            stats.files_replaced,
            stats.lines_scanned,
            stats.bytes_decoded,
            stats.continuation_lines
        );
    }
}

impl Default for GrepMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`GrepMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_searched: u64,
    pub files_failed: u64,
    pub files_replaced: u64,
    pub lines_scanned: u64,
    pub bytes_decoded: u64,
    pub continuation_lines: u64,
}
