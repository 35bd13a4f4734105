//! Transfer and batch statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics for a single completed transfer.
#[derive(Debug, Clone)]
pub struct FileStats {
    /// Bytes written to disk.
    pub size: u64,
    /// Time taken by the transfer.
    pub elapsed: Duration,
    /// Average speed in bytes per second.
    pub average_speed: u64,
}

/// Statistics for one download batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Jobs whose transfer completed.
    pub files_downloaded: usize,
    /// Jobs that were not transferred (already on disk, or failed).
    pub files_skipped: usize,
    /// Total bytes transferred.
    pub total_bytes: u64,
    /// Wall-clock time for the whole batch.
    pub elapsed: Duration,
}

impl BatchStats {
    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Tracks a transfer in flight.
///
/// The transfer callback reports cumulative byte counts; `fetch_max` keeps
/// the high-water mark so a late callback never moves progress backwards.
pub struct TransferTracker {
    start_time: Instant,
    downloaded: AtomicU64,
}

impl Default for TransferTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            downloaded: AtomicU64::new(0),
        }
    }

    /// Records the cumulative byte count and returns the high-water mark.
    pub fn record(&self, cumulative: u64) -> u64 {
        let previous = self.downloaded.fetch_max(cumulative, Ordering::Relaxed);
        previous.max(cumulative)
    }

    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Converts this tracker into final file statistics.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn finish(&self, size: u64) -> FileStats {
        let elapsed = self.elapsed();
        let secs = elapsed.as_secs_f64();
        let average_speed = if secs > 0.0 {
            (size as f64 / secs) as u64
        } else {
            0
        };
        FileStats {
            size,
            elapsed,
            average_speed,
        }
    }
}

/// Accumulates batch statistics as jobs finish.
pub struct BatchStatsBuilder {
    stats: BatchStats,
    start_time: Instant,
}

impl Default for BatchStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStatsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: BatchStats::default(),
            start_time: Instant::now(),
        }
    }

    /// Records a completed transfer.
    pub const fn add_download(&mut self, file_stats: &FileStats) {
        self.stats.files_downloaded += 1;
        self.stats.total_bytes += file_stats.size;
    }

    /// Records a job that did not transfer anything.
    pub const fn add_skip(&mut self) {
        self.stats.files_skipped += 1;
    }

    /// Builds the final batch statistics.
    #[must_use]
    pub fn build(mut self) -> BatchStats {
        self.stats.elapsed = self.start_time.elapsed();
        self.stats
    }
}
