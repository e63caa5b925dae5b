// Timeouts, topics, robot configuration
use std::time::Duration;

use crate::chassis::geometry::{Corner, RobotGeometry};
use crate::chassis::module::{ModuleCalibration, ABSOLUTE_ENCODER_COUNTS};
use crate::chassis::pid::PidGains;

// Control loop frequency
pub const LOOP_HZ: u64 = 50;

// Operator command timeout for the watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "swerve/cmd/drive"; // operator axes
pub const TOPIC_CMD_MODE: &str = "swerve/cmd/mode"; // mode toggles
pub const TOPIC_IMU: &str = "swerve/sensor/imu";
pub const TOPIC_RANGE: &str = "swerve/sensor/range";
pub const TOPIC_ODOMETRY: &str = "swerve/sensor/odometry";
pub const TOPIC_TARGET: &str = "swerve/sensor/target"; // vision pipeline
pub const TOPIC_TELEMETRY: &str = "swerve/rt/telemetry";
pub const TOPIC_HEALTH: &str = "swerve/state/health";

/// Fatal configuration problems, caught before the chassis enters service.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "module {corner}: steer zero reading {reading} outside encoder range 0..{max}",
        max = ABSOLUTE_ENCODER_COUNTS
    )]
    ZeroReadingOutOfRange { corner: &'static str, reading: f64 },
}

/// Controller IDs and calibration for one swerve module.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSetup {
    pub drive_id: u8,
    pub steer_id: u8,
    pub calibration: ModuleCalibration,
}

/// Everything the chassis needs, fixed at startup. Built once and handed to
/// the constructor; nothing here is ambient or mutable afterwards.
#[derive(Debug, Clone, Copy)]
pub struct RobotConfig {
    pub geometry: RobotGeometry,
    /// Modules in corner order a, b, c, d.
    pub modules: [ModuleSetup; 4],
    pub heading_gains: PidGains,
    /// Radians within which heading hold counts as on target.
    pub heading_tolerance: f64,
    pub distance_gains: PidGains,
    /// Metres within which a distance leg counts as complete.
    pub distance_tolerance: f64,
    /// Station-keeping distance engaged by the range-hold toggle, metres.
    pub range_hold_distance: f64,
}

impl RobotConfig {
    /// The competition robot: 600 mm x 498 mm frame, absolute steer
    /// encoders, open-loop drive.
    pub fn standard() -> Self {
        let module = |corner, drive_id, steer_id, zero_reading, reverse_drive| ModuleSetup {
            drive_id,
            steer_id,
            calibration: ModuleCalibration {
                corner,
                zero_reading,
                reverse_drive,
                reverse_steer: true,
                absolute_steer: true,
                has_drive_encoder: false,
                drive_counts_per_metre: 4000.0,
                max_drive_speed: 5000.0,
            },
        };

        Self {
            geometry: RobotGeometry::new(498.0, 600.0),
            modules: [
                module(Corner::A, 8, 10, 187.0, true),
                module(Corner::B, 6, 7, 246.0, false),
                module(Corner::C, 3, 4, 257.0, false),
                module(Corner::D, 1, 12, 873.0, true),
            ],
            heading_gains: PidGains::p(0.5),
            heading_tolerance: 0.05,
            distance_gains: PidGains::p(1.0),
            distance_tolerance: 0.05,
            range_hold_distance: 2.0,
        }
    }

    /// Steer position-loop gains, which depend on the encoder type.
    pub fn steer_gains(calibration: &ModuleCalibration) -> PidGains {
        if calibration.absolute_steer {
            PidGains::p(20.0)
        } else {
            PidGains::p(6.0)
        }
    }

    /// Drive velocity-loop gains for encoder-equipped drive motors.
    pub fn drive_gains() -> PidGains {
        PidGains::p(1.0)
    }
}
