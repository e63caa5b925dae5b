// Low-pass filter over the raw ultrasonic range samples.

/// Smoothing weight for each new sample.
const ALPHA: f64 = 0.7;

/// Readings beyond this are sensor noise; the unit tops out around 40 m.
const MAX_RANGE_M: f64 = 40.0;

#[derive(Debug, Default)]
pub struct RangeFilter {
    smoothed: f64,
    seen_sample: bool,
}

impl RangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one raw distance sample, metres.
    pub fn update(&mut self, raw: f64) {
        let clamped = raw.min(MAX_RANGE_M);
        if self.seen_sample {
            self.smoothed = ALPHA * clamped + (1.0 - ALPHA) * self.smoothed;
        } else {
            self.smoothed = clamped;
            self.seen_sample = true;
        }
    }

    /// Smoothed distance, or None before the first sample arrives.
    pub fn distance(&self) -> Option<f64> {
        self.seen_sample.then_some(self.smoothed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_distance_before_first_sample() {
        let filter = RangeFilter::new();
        assert!(filter.distance().is_none());
    }

    #[test]
    fn first_sample_passes_through() {
        let mut filter = RangeFilter::new();
        filter.update(2.0);
        assert!((filter.distance().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn smoothing_blends_towards_new_samples() {
        let mut filter = RangeFilter::new();
        filter.update(2.0);
        filter.update(4.0);
        // 0.7 * 4 + 0.3 * 2
        assert!((filter.distance().unwrap() - 3.4).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let mut filter = RangeFilter::new();
        filter.update(500.0);
        assert!((filter.distance().unwrap() - 40.0).abs() < 1e-12);
    }
}
