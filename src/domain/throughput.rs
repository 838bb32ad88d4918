//! Smoothed download speed per model id.
//!
//! Progress samples arrive in irregular bursts. Samples closer together than
//! [`MIN_SAMPLE_INTERVAL_SECONDS`] are not folded into the estimate; the rest feed an
//! exponential moving average weighted by [`EMA_ALPHA`].

use std::collections::HashMap;
use std::time::Instant;

/// Samples closer than this to the previous accepted one are ignored.
pub const MIN_SAMPLE_INTERVAL_SECONDS: f64 = 0.5;

/// Weight of the newest instantaneous speed in the moving average.
pub const EMA_ALPHA: f64 = 0.2;

/// Speeds are reported in MB/s with 1 MB = 1 MiB.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Derived throughput statistics for one download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadStats {
    pub start_time: Instant,
    pub last_update: Instant,
    /// Byte count at `last_update`.
    pub total_downloaded: u64,
    /// Smoothed speed in MB/s.
    pub speed: f64,
}

impl DownloadStats {
    fn new(downloaded: u64, now: Instant) -> Self {
        Self {
            start_time: now,
            last_update: now,
            total_downloaded: downloaded,
            speed: 0.0,
        }
    }

    /// Estimated seconds until `total` bytes are reached, if the speed is known.
    pub fn eta_seconds(&self, total: u64) -> Option<f64> {
        if self.speed <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.total_downloaded) as f64 / BYTES_PER_MB;
        Some(remaining / self.speed)
    }
}

#[derive(Debug, Default)]
pub struct ThroughputEstimator {
    stats: HashMap<String, DownloadStats>,
}

impl ThroughputEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a `(model_id, downloaded, now)` sample.
    ///
    /// Returns true if the sample changed the estimate. The first sample for an id
    /// only initializes its stats and also returns true.
    pub fn record(&mut self, model_id: &str, downloaded: u64, now: Instant) -> bool {
        let Some(stats) = self.stats.get_mut(model_id) else {
            self.stats
                .insert(model_id.to_string(), DownloadStats::new(downloaded, now));
            return true;
        };

        let elapsed = now.saturating_duration_since(stats.last_update).as_secs_f64();
        if elapsed <= MIN_SAMPLE_INTERVAL_SECONDS {
            return false;
        }

        // A corrected total can move backwards; that counts as no progress.
        let delta = downloaded.saturating_sub(stats.total_downloaded) as f64;
        let instantaneous = (delta / BYTES_PER_MB) / elapsed;

        stats.speed = if stats.speed > 0.0 {
            stats.speed * (1.0 - EMA_ALPHA) + instantaneous * EMA_ALPHA
        } else {
            instantaneous
        };
        stats.last_update = now;
        stats.total_downloaded = downloaded;
        true
    }

    pub fn stats(&self, model_id: &str) -> Option<&DownloadStats> {
        self.stats.get(model_id)
    }

    pub fn speed(&self, model_id: &str) -> Option<f64> {
        self.stats.get(model_id).map(|s| s.speed)
    }

    pub fn remove(&mut self, model_id: &str) -> Option<DownloadStats> {
        self.stats.remove(model_id)
    }

    /// Keep only the ids for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.stats.retain(|id, _| keep(id));
    }

    pub fn clear(&mut self) {
        self.stats.clear();
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
