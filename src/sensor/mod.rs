// Sensor inputs to the control core.
//
// The runtime assembles one SensorSnapshot per tick from the latest samples;
// within a tick the snapshot is read before arbitration, so the core never
// sees a sensor value change mid-tick. Absent fields mean the source had
// nothing fresh, and each consumer degrades to its defined default.

pub mod imu;
pub mod range;
pub mod vision;

pub use imu::HeadingTracker;
pub use range::RangeFilter;
pub use vision::{TargetChannel, TargetReading};

/// Best-available sensor data for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorSnapshot {
    /// Yaw in radians, already offset by any heading reset.
    pub heading: f64,
    /// Yaw rate in radians per second.
    pub heading_rate: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Smoothed range to whatever is ahead, metres.
    pub range: Option<f64>,
    /// Latest fresh vision target, if any.
    pub target: Option<TargetReading>,
    /// Two independent drive-wheel odometry readings, metres.
    pub odometry: Option<(f64, f64)>,
}

impl SensorSnapshot {
    /// Average of the two odometry readings, the distance measure the
    /// autonomous leg sequencer closes its loop on.
    pub fn odometry_avg(&self) -> Option<f64> {
        self.odometry.map(|(left, right)| (left + right) / 2.0)
    }
}
