use serde::{Deserialize, Serialize};

/// Fixed-width histogram over ΔH samples.
///
/// Bins are anchored at integer multiples of the spacing so histograms built
/// from different windows of the same run line up exactly. Samples past the
/// last bin are clamped into it: the total count always equals the number of
/// samples fed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaHHistogram {
    spacing: f64,
    start_bin: i64,
    counts: Vec<u32>,
}

impl DeltaHHistogram {
    pub fn from_samples(samples: &[f64], spacing: f64, max_bins: usize) -> Self {
        assert!(spacing > 0.0, "histogram spacing must be positive");
        if samples.is_empty() {
            return Self {
                spacing,
                start_bin: 0,
                counts: Vec::new(),
            };
        }

        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let start_bin = (min / spacing).floor() as i64;
        let span = ((max / spacing).floor() as i64 - start_bin + 1) as usize;
        let n_bins = span.min(max_bins.max(1));

        let mut counts = vec![0u32; n_bins];
        for &sample in samples {
            let bin = ((sample / spacing).floor() as i64 - start_bin) as usize;
            counts[bin.min(n_bins - 1)] += 1;
        }
        Self {
            spacing,
            start_bin,
            counts,
        }
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn start_bin(&self) -> i64 {
        self.start_bin
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn total_count(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Lower edge of bin `index`.
    pub fn bin_edge(&self, index: usize) -> f64 {
        (self.start_bin + index as i64) as f64 * self.spacing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sum_to_the_sample_count() {
        let samples: Vec<f64> = (0..1000).map(|i| (i as f64) * 0.013 - 4.0).collect();
        let histogram = DeltaHHistogram::from_samples(&samples, 0.25, 64);
        assert_eq!(histogram.total_count(), 1000);
    }

    #[test]
    fn bins_anchor_at_spacing_multiples() {
        let histogram = DeltaHHistogram::from_samples(&[1.1, 1.4, 2.6], 0.5, 16);
        assert_eq!(histogram.start_bin(), 2);
        assert_eq!(histogram.bin_edge(0), 1.0);
        assert_eq!(histogram.counts(), &[2, 0, 0, 1]);
    }

    #[test]
    fn negative_samples_get_negative_start_bins() {
        let histogram = DeltaHHistogram::from_samples(&[-1.2, -0.7, 0.3], 0.5, 16);
        assert_eq!(histogram.start_bin(), -3);
        assert_eq!(histogram.total_count(), 3);
    }

    #[test]
    fn overflowing_samples_clamp_into_the_last_bin() {
        let histogram = DeltaHHistogram::from_samples(&[0.1, 0.2, 100.0], 0.5, 4);
        assert_eq!(histogram.counts().len(), 4);
        assert_eq!(histogram.total_count(), 3);
        assert_eq!(histogram.counts()[3], 1);
    }

    #[test]
    fn empty_input_yields_an_empty_histogram() {
        let histogram = DeltaHHistogram::from_samples(&[], 0.5, 16);
        assert_eq!(histogram.total_count(), 0);
        assert!(histogram.counts().is_empty());
    }
}
