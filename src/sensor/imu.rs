// Resettable heading over the raw IMU stream.
//
// The IMU publishes its own absolute yaw; "reset heading" is a local offset
// latch, so the operator can re-zero field-forward without touching the
// sensor.

use crate::chassis::angle::normalize;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImuSample {
    pub yaw: f64,
    pub yaw_rate: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Default)]
pub struct HeadingTracker {
    latest: ImuSample,
    offset: f64,
}

impl HeadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: ImuSample) {
        self.latest = sample;
    }

    /// Zero the heading at the current yaw.
    pub fn reset_heading(&mut self) {
        self.offset = self.latest.yaw;
    }

    pub fn heading(&self) -> f64 {
        normalize(self.latest.yaw - self.offset)
    }

    pub fn heading_rate(&self) -> f64 {
        self.latest.yaw_rate
    }

    pub fn pitch(&self) -> f64 {
        self.latest.pitch
    }

    pub fn roll(&self) -> f64 {
        self.latest.roll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_current_heading() {
        let mut tracker = HeadingTracker::new();
        tracker.update(ImuSample {
            yaw: 1.2,
            ..Default::default()
        });
        assert!((tracker.heading() - 1.2).abs() < 1e-12);

        tracker.reset_heading();
        assert_eq!(tracker.heading(), 0.0);

        tracker.update(ImuSample {
            yaw: 1.5,
            ..Default::default()
        });
        assert!((tracker.heading() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn heading_wraps_after_offset() {
        let mut tracker = HeadingTracker::new();
        tracker.update(ImuSample {
            yaw: 3.0,
            ..Default::default()
        });
        tracker.reset_heading();
        tracker.update(ImuSample {
            yaw: -3.0,
            ..Default::default()
        });
        // -3.0 - 3.0 = -6.0, wrapped into (-pi, pi] is 2*pi - 6
        assert!((tracker.heading() - (2.0 * std::f64::consts::PI - 6.0)).abs() < 1e-9);
    }
}
