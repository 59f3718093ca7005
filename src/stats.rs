//! Fixed-capacity rolling-window statistics over recent load samples.

use std::collections::VecDeque;

use crate::clock::UnixTime;

/// Sliding buffer of `(value, timestamp)` pairs with FIFO eviction.
///
/// Provides live mean/std/min/max over the most recent `capacity` samples.
/// Every statistic of an empty window is `0.0`; none of the accessors panic.
///
/// # Examples
///
/// ```
/// use voltage_sim::stats::RollingWindowStats;
///
/// let mut stats = RollingWindowStats::new(3);
/// stats.add(1.0, 0);
/// stats.add(2.0, 30);
/// stats.add(3.0, 60);
/// stats.add(4.0, 90); // evicts the oldest sample
/// assert_eq!(stats.mean(), 3.0);
/// assert_eq!(stats.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RollingWindowStats {
    capacity: usize,
    samples: VecDeque<(f64, UnixTime)>,
}

impl RollingWindowStats {
    /// Default capacity: 120 samples, one hour of history at 30 s ticks.
    pub const DEFAULT_CAPACITY: usize = 120;

    /// Creates a window holding at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a sample, evicting the oldest when the window is full.
    pub fn add(&mut self, value: f64, timestamp: UnixTime) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((value, timestamp));
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured maximum sample count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean of the window, `0.0` when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|(v, _)| v).sum();
        sum / self.samples.len() as f64
    }

    /// Mean of samples stamped at or after `cutoff`, `0.0` when none
    /// qualify.
    ///
    /// Used for the short (10-minute) mean the overdraw detector compares
    /// against its hourly baseline; selecting by timestamp keeps the span
    /// correct whatever the tick bucket size.
    pub fn mean_since(&self, cutoff: UnixTime) -> f64 {
        let mut sum = 0.0;
        let mut count = 0_usize;
        for (v, ts) in self.samples.iter().rev() {
            if *ts < cutoff {
                break;
            }
            sum += v;
            count += 1;
        }
        if count == 0 {
            return 0.0;
        }
        sum / count as f64
    }

    /// Mean of the most recent `n` samples, `0.0` when empty.
    pub fn mean_last(&self, n: usize) -> f64 {
        if self.samples.is_empty() || n == 0 {
            return 0.0;
        }
        let take = n.min(self.samples.len());
        let sum: f64 = self
            .samples
            .iter()
            .rev()
            .take(take)
            .map(|(v, _)| v)
            .sum();
        sum / take as f64
    }

    /// Sample standard deviation (n-1 denominator), `0.0` below 2 samples.
    pub fn std(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let sq_sum: f64 = self
            .samples
            .iter()
            .map(|(v, _)| {
                let d = v - mean;
                d * d
            })
            .sum();
        (sq_sum / (n - 1) as f64).sqrt()
    }

    /// Minimum value in the window, `0.0` when empty.
    pub fn min(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples
            .iter()
            .map(|(v, _)| *v)
            .fold(f64::INFINITY, f64::min)
    }

    /// Maximum value in the window, `0.0` when empty.
    pub fn max(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples
            .iter()
            .map(|(v, _)| *v)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Most recent value, if any.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|(v, _)| *v)
    }

    /// Timestamp of the oldest sample, if any.
    pub fn oldest_timestamp(&self) -> Option<UnixTime> {
        self.samples.front().map(|(_, t)| *t)
    }

    /// Timestamp of the newest sample, if any.
    pub fn latest_timestamp(&self) -> Option<UnixTime> {
        self.samples.back().map(|(_, t)| *t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_statistics_are_zero() {
        let stats = RollingWindowStats::new(10);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.std(), 0.0);
        assert_eq!(stats.min(), 0.0);
        assert_eq!(stats.max(), 0.0);
        assert_eq!(stats.latest(), None);
        assert!(stats.is_empty());
    }

    #[test]
    fn std_of_single_sample_is_zero() {
        let mut stats = RollingWindowStats::new(10);
        stats.add(5.0, 0);
        assert_eq!(stats.std(), 0.0);
        assert_eq!(stats.mean(), 5.0);
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        let mut stats = RollingWindowStats::new(10);
        for (i, v) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().enumerate() {
            stats.add(*v, i as i64);
        }
        // population variance is 4.0; sample variance is 32/7
        assert!((stats.std() - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_fifo() {
        let mut stats = RollingWindowStats::new(5);
        for i in 0..50 {
            stats.add(i as f64, i as i64 * 30);
            assert!(stats.len() <= 5);
        }
        assert_eq!(stats.len(), 5);
        // oldest surviving sample is the 46th (index 45)
        assert_eq!(stats.oldest_timestamp(), Some(45 * 30));
        assert_eq!(stats.min(), 45.0);
        assert_eq!(stats.max(), 49.0);
        assert_eq!(stats.latest(), Some(49.0));
    }

    #[test]
    fn mean_since_selects_by_timestamp() {
        let mut stats = RollingWindowStats::new(120);
        // One sample per 60 s bucket: only the last ten land in a
        // 600-second span.
        for i in 0..30_i64 {
            stats.add(i as f64, i * 60);
        }
        let now: UnixTime = 29 * 60;
        // Samples stamped 20*60 .. 29*60 -> values 20..=29, mean 24.5
        assert_eq!(stats.mean_since(now - 600 + 60), 24.5);
        assert_eq!(stats.mean_since(now + 1), 0.0);
        assert_eq!(stats.mean_since(0), stats.mean());
    }

    #[test]
    fn mean_last_takes_most_recent() {
        let mut stats = RollingWindowStats::new(10);
        for i in 0..10 {
            stats.add(i as f64, i as i64);
        }
        assert_eq!(stats.mean_last(2), 8.5);
        assert_eq!(stats.mean_last(100), stats.mean());
        assert_eq!(stats.mean_last(0), 0.0);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        RollingWindowStats::new(0);
    }
}
