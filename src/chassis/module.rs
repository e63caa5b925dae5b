// One swerve module: a steered, driven wheel unit.
//
// The module owns its two actuators and is the only writer to them. Current
// direction is always derived from the steer actuator's setpoint, so the
// steering position never unwinds across mode changes.

use std::f64::consts::{FRAC_PI_6, PI};

use tracing::warn;

use super::angle::{min_angular_displacement, normalize};
use super::geometry::Corner;
use crate::config::ConfigError;
use crate::motor::{ActuationError, Actuator};

/// Below this commanded magnitude the module holds its steer setpoint and
/// stops the drive, so near-zero commands cannot jitter the steering.
pub const DRIVE_DEADBAND: f64 = 0.05;

/// Absolute steer encoders give 1024 counts per revolution.
pub const ABSOLUTE_ENCODER_COUNTS: f64 = 1024.0;

/// Fixed calibration for one module, set once at construction.
#[derive(Debug, Clone, Copy)]
pub struct ModuleCalibration {
    pub corner: Corner,
    /// Raw absolute-encoder reading with the wheel pointing straight ahead.
    pub zero_reading: f64,
    pub reverse_drive: bool,
    pub reverse_steer: bool,
    /// Absolute steer encoder; incremental otherwise.
    pub absolute_steer: bool,
    /// Whether the drive motor has an incremental encoder (closed-loop
    /// velocity) or runs open-loop duty cycle.
    pub has_drive_encoder: bool,
    /// Drive encoder counts per metre of wheel travel.
    pub drive_counts_per_metre: f64,
    /// Calibrated full-scale drive speed, counts per second.
    pub max_drive_speed: f64,
}

impl ModuleCalibration {
    pub fn counts_per_radian(&self) -> f64 {
        if self.absolute_steer {
            ABSOLUTE_ENCODER_COUNTS / (2.0 * PI)
        } else {
            // 497 counts/rev through a 40:48 reduction, 4x decoding
            497.0 * (40.0 / 48.0) * 4.0 / (2.0 * PI)
        }
    }

    fn steer_offset(&self) -> f64 {
        if !self.absolute_steer {
            return 0.0;
        }
        let offset = self.zero_reading - ABSOLUTE_ENCODER_COUNTS / 4.0;
        if self.reverse_steer { -offset } else { offset }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.absolute_steer
            && !(0.0..ABSOLUTE_ENCODER_COUNTS).contains(&self.zero_reading)
        {
            return Err(ConfigError::ZeroReadingOutOfRange {
                corner: self.corner.name(),
                reading: self.zero_reading,
            });
        }
        Ok(())
    }
}

pub struct SwerveModule {
    calibration: ModuleCalibration,
    offset: f64,
    counts_per_radian: f64,
    steer: Box<dyn Actuator + Send>,
    drive: Box<dyn Actuator + Send>,
    odometry_base: f64,
}

impl SwerveModule {
    pub fn new(
        calibration: ModuleCalibration,
        steer: Box<dyn Actuator + Send>,
        drive: Box<dyn Actuator + Send>,
    ) -> Result<Self, ConfigError> {
        calibration.validate()?;
        Ok(Self {
            offset: calibration.steer_offset(),
            counts_per_radian: calibration.counts_per_radian(),
            calibration,
            steer,
            drive,
            odometry_base: 0.0,
        })
    }

    pub fn corner(&self) -> Corner {
        self.calibration.corner
    }

    /// Current commanded steer angle in radians, from the steer setpoint.
    pub fn direction(&self) -> f64 {
        (self.steer.setpoint() - self.offset) / self.counts_per_radian
    }

    /// Current commanded drive magnitude, in the drive actuator's units.
    pub fn speed(&self) -> f64 {
        self.drive.setpoint()
    }

    /// Point the wheel and set its speed.
    ///
    /// With `speed` present the steering takes the minimal angular
    /// displacement, reversing the drive direction when the other way round
    /// was shorter. With `speed` absent the wheel is forced through the full
    /// signed rotation to `direction` with the drive stopped, which is how
    /// the wheel-lock pose is pre-positioned.
    pub fn steer(&mut self, direction: f64, speed: Option<f64>) -> Result<(), ActuationError> {
        let Some(speed) = speed else {
            let delta = normalize(direction - self.direction());
            let target = (self.direction() + delta) * self.counts_per_radian + self.offset;
            self.set_drive(0.0)?;
            self.steer.set_position_target(target)?;
            return Ok(());
        };

        if speed.abs() <= DRIVE_DEADBAND {
            // Hold the current steer setpoint; only stop the drive.
            return self.set_drive(0.0);
        }

        let direction = normalize(direction);
        let current = normalize(self.direction());
        let delta = min_angular_displacement(current, direction);

        let mut speed = speed;
        if self.calibration.reverse_drive {
            speed = -speed;
        }
        // If pointing straight at the target needed more than pi/6 of
        // rotation, the minimal delta above went to the opposite heading, so
        // drive backwards along it.
        if normalize(direction - current).abs() > FRAC_PI_6 {
            speed = -speed;
        }

        self.set_drive(speed)?;
        let target = (self.direction() + delta) * self.counts_per_radian + self.offset;
        self.steer.set_position_target(target)
    }

    fn set_drive(&mut self, speed: f64) -> Result<(), ActuationError> {
        if self.calibration.has_drive_encoder {
            self.drive
                .set_velocity_target(speed * self.calibration.max_drive_speed)
        } else {
            self.drive.set_duty_cycle(speed)
        }
    }

    /// Metres travelled by the drive wheel since the last zeroing, when a
    /// drive encoder is fitted.
    pub fn distance(&mut self) -> Option<f64> {
        if !self.calibration.has_drive_encoder {
            return None;
        }
        match self.drive.position() {
            Ok(counts) => {
                Some((counts - self.odometry_base) / self.calibration.drive_counts_per_metre)
            }
            Err(e) => {
                warn!(
                    "module {}: drive odometry read failed: {}",
                    self.corner().name(),
                    e
                );
                None
            }
        }
    }

    pub fn zero_distance(&mut self) {
        if let Ok(counts) = self.drive.position() {
            self.odometry_base = counts;
        }
    }

    /// Drive motor current draw in amps, for telemetry.
    pub fn drive_current(&mut self) -> Option<f64> {
        self.drive.output_current().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::OfflineActuator;
    use std::f64::consts::FRAC_PI_2;

    const EPSILON: f64 = 1e-9;

    fn test_calibration() -> ModuleCalibration {
        ModuleCalibration {
            corner: Corner::A,
            zero_reading: 256.0,
            reverse_drive: false,
            reverse_steer: false,
            absolute_steer: true,
            has_drive_encoder: false,
            drive_counts_per_metre: 1000.0,
            max_drive_speed: 5000.0,
        }
    }

    fn test_module(calibration: ModuleCalibration) -> SwerveModule {
        SwerveModule::new(
            calibration,
            Box::new(OfflineActuator::new()),
            Box::new(OfflineActuator::new()),
        )
        .unwrap()
    }

    #[test]
    fn construction_rejects_bad_zero_reading() {
        let calibration = ModuleCalibration {
            zero_reading: 1500.0,
            ..test_calibration()
        };
        let result = SwerveModule::new(
            calibration,
            Box::new(OfflineActuator::new()),
            Box::new(OfflineActuator::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn deadband_stops_drive_and_holds_steer() {
        let mut module = test_module(test_calibration());
        module.steer(1.0, Some(1.0)).unwrap();
        let direction = module.direction();
        assert!(module.speed().abs() > 0.0);

        module.steer(-2.0, Some(0.04)).unwrap();
        assert_eq!(module.speed(), 0.0);
        assert!((module.direction() - direction).abs() < EPSILON);
    }

    #[test]
    fn small_turn_drives_forward() {
        let mut module = test_module(test_calibration());
        module.steer(0.1, Some(0.5)).unwrap();
        assert!((module.speed() - 0.5).abs() < EPSILON);
        assert!((module.direction() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn large_turn_reverses_drive() {
        let mut module = test_module(test_calibration());
        // Quarter turn away: steering goes the short way to the opposite
        // heading and the drive reverses.
        module.steer(FRAC_PI_2 + 0.2, Some(0.5)).unwrap();
        assert!(module.speed() < 0.0);
        assert!(module.direction().abs() <= FRAC_PI_2 + 1e-6);
    }

    #[test]
    fn reverse_drive_flips_sign() {
        let calibration = ModuleCalibration {
            reverse_drive: true,
            ..test_calibration()
        };
        let mut module = test_module(calibration);
        module.steer(0.0, Some(0.5)).unwrap();
        assert!((module.speed() - -0.5).abs() < EPSILON);
    }

    #[test]
    fn directional_steer_takes_full_delta() {
        let mut module = test_module(test_calibration());
        // A target pi away would normally be reached by reversing; the
        // directional-only call must rotate all the way there.
        module.steer(3.0, None).unwrap();
        assert_eq!(module.speed(), 0.0);
        assert!((normalize(module.direction()) - normalize(3.0)).abs() < 1e-6);
        assert!((module.direction() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn encoder_module_commands_scaled_velocity() {
        let calibration = ModuleCalibration {
            has_drive_encoder: true,
            ..test_calibration()
        };
        let mut module = test_module(calibration);
        module.steer(0.0, Some(0.5)).unwrap();
        assert!((module.speed() - 2500.0).abs() < EPSILON);
    }

    #[test]
    fn distance_uses_drive_counts_per_metre() {
        let calibration = ModuleCalibration {
            has_drive_encoder: true,
            ..test_calibration()
        };
        let mut drive = OfflineActuator::new();
        drive.set_present_position(2500.0);
        let mut module = SwerveModule::new(
            calibration,
            Box::new(OfflineActuator::new()),
            Box::new(drive),
        )
        .unwrap();
        assert!((module.distance().unwrap() - 2.5).abs() < EPSILON);
    }

    #[test]
    fn no_encoder_means_no_distance() {
        let mut module = test_module(test_calibration());
        assert!(module.distance().is_none());
    }
}
