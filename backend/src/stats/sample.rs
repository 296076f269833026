//! Online sample statistics
//!
//! [`SampleSeries`] accumulates count, sum, min/max and a running mean plus
//! sum of squared deviations (Welford). Two series merge with Chan's parallel
//! formula, which makes the merge associative and commutative up to floating
//! point rounding. Raw samples are optional and only needed for percentiles,
//! distributions and correlation.

use super::normal::stdnormal_inv;
use serde::{Deserialize, Serialize};

/// Mergeable running statistics for one observed metric
///
/// # Example
/// ```
/// use combat_simulator_core_rs::stats::SampleSeries;
///
/// let mut a = SampleSeries::new();
/// a.add(1.0);
/// a.add(3.0);
///
/// let mut b = SampleSeries::new();
/// b.add(5.0);
///
/// a.merge(&b);
/// assert_eq!(a.count(), 3);
/// assert_eq!(a.mean(), 3.0);
/// assert_eq!(a.max(), Some(5.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSeries {
    count: u64,
    sum: f64,
    mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
    min: Option<f64>,
    max: Option<f64>,
    /// Raw samples, when retained
    data: Option<Vec<f64>>,
    #[serde(skip)]
    sorted: bool,
}

impl SampleSeries {
    /// Series that keeps only running statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Series that also keeps every raw sample
    pub fn with_data() -> Self {
        Self {
            data: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn keeps_data(&self) -> bool {
        self.data.is_some()
    }

    /// Record one observation
    pub fn add(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
        if let Some(data) = self.data.as_mut() {
            data.push(x);
            self.sorted = false;
        }
    }

    /// Fold `other` into `self`
    ///
    /// Raw samples are concatenated only when both sides keep them; otherwise
    /// the merged series drops its raw samples.
    pub fn merge(&mut self, other: &SampleSeries) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;

        self.mean = (n_a * self.mean + n_b * other.mean) / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
        self.sum += other.sum;
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        match (self.data.as_mut(), other.data.as_ref()) {
            (Some(mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                self.sorted = false;
            }
            _ => self.data = None,
        }
    }

    /// Drop every observation, keeping the raw-data mode
    pub fn clear(&mut self) {
        let keep = self.data.is_some();
        *self = if keep { Self::with_data() } else { Self::new() };
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Arithmetic mean, 0 for an empty series
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Unbiased sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean
    pub fn mean_std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.std_dev() / (self.count as f64).sqrt()
        }
    }

    /// Half width of the two-sided confidence interval of the mean
    pub fn confidence_half_width(&self, confidence: f64) -> f64 {
        let z = stdnormal_inv(0.5 + confidence / 2.0);
        z * self.mean_std_dev()
    }

    /// Half width relative to the mean, `None` when the mean is zero
    pub fn relative_error(&self, confidence: f64) -> Option<f64> {
        let mean = self.mean();
        if self.count < 2 || mean == 0.0 {
            return None;
        }
        Some(self.confidence_half_width(confidence) / mean.abs())
    }

    pub fn data(&self) -> Option<&[f64]> {
        self.data.as_deref()
    }

    // ========================================================================
    // Raw-data analysis
    // ========================================================================

    /// Sort raw samples in place so percentile queries avoid copies
    pub fn analyze(&mut self) {
        if let Some(data) = self.data.as_mut() {
            if !self.sorted {
                data.sort_by(|a, b| a.total_cmp(b));
                self.sorted = true;
            }
        }
    }

    /// Value at fraction `p` (0..=1) of the sorted samples
    ///
    /// Returns `None` without raw data or samples.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let data = self.data.as_ref()?;
        if data.is_empty() {
            return None;
        }
        let index = ((data.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
        if self.sorted {
            return Some(data[index]);
        }
        let mut sorted = data.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(sorted[index])
    }

    /// Histogram of raw samples over `[min, max]` with `buckets` equal bins
    pub fn distribution(&self, buckets: usize) -> Vec<u64> {
        let (Some(data), Some(min), Some(max)) = (self.data.as_ref(), self.min, self.max) else {
            return Vec::new();
        };
        if buckets == 0 {
            return Vec::new();
        }
        let mut counts = vec![0u64; buckets];
        let range = max - min;
        for &x in data {
            let bucket = if range > 0.0 {
                (((x - min) / range) * buckets as f64) as usize
            } else {
                0
            };
            counts[bucket.min(buckets - 1)] += 1;
        }
        counts
    }

    /// Pearson correlation between two equally sized raw series
    pub fn pearson_correlation(a: &SampleSeries, b: &SampleSeries) -> Option<f64> {
        let (xs, ys) = (a.data.as_ref()?, b.data.as_ref()?);
        if xs.len() != ys.len() || xs.len() < 2 {
            return None;
        }
        let (mx, my) = (a.mean(), b.mean());
        let mut cov = 0.0;
        let mut vx = 0.0;
        let mut vy = 0.0;
        for (x, y) in xs.iter().zip(ys) {
            cov += (x - mx) * (y - my);
            vx += (x - mx).powi(2);
            vy += (y - my).powi(2);
        }
        if vx == 0.0 || vy == 0.0 {
            return None;
        }
        Some(cov / (vx.sqrt() * vy.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> SampleSeries {
        let mut s = SampleSeries::with_data();
        for &v in values {
            s.add(v);
        }
        s
    }

    #[test]
    fn test_empty_series() {
        let s = SampleSeries::new();
        assert_eq!(s.count(), 0);
        assert_eq!(s.mean(), 0.0);
        assert_eq!(s.min(), None);
        assert_eq!(s.variance(), 0.0);
        assert_eq!(s.percentile(0.5), None);
    }

    #[test]
    fn test_variance_matches_two_pass() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = series(&values);
        assert_eq!(s.mean(), 5.0);
        // sample variance = 32 / 7
        assert!((s.variance() - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_variance_matches_single_series() {
        let values: Vec<f64> = (0..100).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let whole = series(&values);
        let mut left = series(&values[..37]);
        let right = series(&values[37..]);
        left.merge(&right);
        assert_eq!(left.count(), whole.count());
        assert!((left.variance() - whole.variance()).abs() < 1e-9);
        assert_eq!(left.min(), whole.min());
        assert_eq!(left.max(), whole.max());
    }

    #[test]
    fn test_merge_drops_data_when_one_side_lacks_it() {
        let mut a = series(&[1.0, 2.0]);
        let mut b = SampleSeries::new();
        b.add(3.0);
        a.merge(&b);
        assert!(!a.keeps_data());
        assert_eq!(a.count(), 3);
    }

    #[test]
    fn test_percentile() {
        let mut s = series(&[5.0, 1.0, 3.0, 2.0, 4.0]);
        assert_eq!(s.percentile(0.0), Some(1.0));
        assert_eq!(s.percentile(0.5), Some(3.0));
        s.analyze();
        assert_eq!(s.percentile(1.0), Some(5.0));
    }

    #[test]
    fn test_distribution_counts_every_sample() {
        let s = series(&[0.0, 0.5, 1.0, 1.0, 2.0]);
        let dist = s.distribution(4);
        assert_eq!(dist.iter().sum::<u64>(), 5);
        assert_eq!(dist[3], 1, "max lands in the last bucket");
    }

    #[test]
    fn test_pearson_correlation() {
        let a = series(&[1.0, 2.0, 3.0, 4.0]);
        let b = series(&[2.0, 4.0, 6.0, 8.0]);
        let c = series(&[8.0, 6.0, 4.0, 2.0]);
        assert!((SampleSeries::pearson_correlation(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        assert!((SampleSeries::pearson_correlation(&a, &c).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_relative_error_shrinks_with_samples() {
        let few = series(&[9.0, 11.0, 10.0, 10.5]);
        let many = series(&[9.0, 11.0, 10.0, 10.5].repeat(100));
        let e_few = few.relative_error(0.95).unwrap();
        let e_many = many.relative_error(0.95).unwrap();
        assert!(e_many < e_few);
    }
}
