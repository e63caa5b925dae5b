// Chassis control core
//
// Owns the four swerve modules and arbitrates, every tick, which source
// supplies the body-frame motion command: manual axes, field-oriented manual,
// heading hold, vision strafe, range hold, an autonomous distance leg, or the
// wheel-lock pose. The winner is decomposed into per-module steering vectors
// and handed to the modules.

pub mod angle;
pub mod geometry;
pub mod module;
pub mod pid;

use std::f64::consts::FRAC_PI_2;

use tracing::{debug, info, warn};

use crate::config::{ConfigError, RobotConfig};
use crate::input::rescale_rate;
use crate::messages::{ChassisTelemetry, DriveCommand, ModuleTelemetry};
use crate::motor::OfflineActuator;
use crate::sensor::SensorSnapshot;

use angle::normalize;
use geometry::{Corner, RobotGeometry};
use module::SwerveModule;
use pid::Pid;

/// Stick deflection below this is treated as no manual input.
const MANUAL_INPUT_THRESHOLD: f64 = 0.05;

/// Yaw rate below which the gyro counts as settled after a manual turn.
const GYRO_SETTLED_RATE: f64 = 0.05;

/// Sensor-error-to-velocity rate for range hold and vision strafing.
const SENSOR_DRIVE_RATE: f64 = 0.3;

/// Metres of sideways correction per unit of vision x offset when planning
/// a distance leg.
const VISION_STRAFE_GAIN: f64 = 0.5;

/// Rotate a field-frame stick vector into the body frame at `heading`.
///
/// This is the canonical convention: rotation by -heading, so that with the
/// robot yawed left, "field forward" maps to a body vector angled right.
/// At heading 0 it is the identity; applying it again at -heading inverts it.
pub fn field_orient(vx: f64, vy: f64, heading: f64) -> (f64, f64) {
    let (sin, cos) = heading.sin_cos();
    (vx * cos + vy * sin, -vx * sin + vy * cos)
}

/// Per-module steering targets for a body motion command: (direction,
/// magnitude) per corner, with magnitudes jointly normalized so no module
/// is asked for more than the no-rotation baseline speed.
pub fn target_vectors(geometry: &RobotGeometry, vx: f64, vy: f64, vz: f64) -> [(f64, f64); 4] {
    let mut polar = [(0.0, 0.0); 4];
    let mut max_mag: f64 = 1.0;

    for (i, corner) in Corner::ALL.iter().enumerate() {
        let (rx, ry) = geometry.rotation_vector(*corner);
        let x = vx + vz * rx;
        let y = vy + vz * ry;
        polar[i] = (y.atan2(x), x.hypot(y));
        max_mag = max_mag.max(polar[i].1);
    }

    for vector in &mut polar {
        vector.1 /= max_mag;
    }
    polar
}

/// One autonomous displacement segment: closed loop on progress along a
/// fixed body-frame heading, measured off the odometry average.
struct DistanceLeg {
    heading: f64,
    /// Odometry average latched when the leg was planned.
    start: f64,
    pid: Pid,
}

pub struct Chassis {
    config: RobotConfig,
    modules: [SwerveModule; 4],

    inputs: DriveCommand,
    // Resolved motion command, published for telemetry
    vx: f64,
    vy: f64,
    vz: f64,
    throttle: Option<f64>,

    field_oriented: bool,
    track_vision: bool,
    heading_hold: bool,
    momentum: bool,
    lock_wheels: bool,
    relatch_heading: bool,
    range_setpoint: Option<f64>,

    heading_pid: Pid,
    leg: Option<DistanceLeg>,
    last_leg_output: f64,
}

impl Chassis {
    /// Modules must be in corner order a, b, c, d, matching the config they
    /// were built from.
    pub fn new(config: RobotConfig, modules: [SwerveModule; 4]) -> Self {
        let heading_pid = Pid::new(config.heading_gains)
            .continuous(2.0 * std::f64::consts::PI)
            .with_tolerance(config.heading_tolerance);

        Self {
            config,
            modules,
            inputs: DriveCommand::default(),
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            throttle: None,
            field_oriented: true,
            track_vision: false,
            heading_hold: false,
            momentum: false,
            lock_wheels: false,
            relatch_heading: false,
            range_setpoint: None,
            heading_pid,
            leg: None,
            last_leg_output: 0.0,
        }
    }

    /// Chassis on offline actuators: simulation and tests.
    pub fn offline(config: RobotConfig) -> Result<Self, ConfigError> {
        let mut modules = Vec::with_capacity(4);
        for setup in &config.modules {
            modules.push(SwerveModule::new(
                setup.calibration,
                Box::new(OfflineActuator::new()),
                Box::new(OfflineActuator::new()),
            )?);
        }
        let modules = match modules.try_into() {
            Ok(m) => m,
            // Length is 4 by construction
            Err(_) => unreachable!("built exactly four modules"),
        };
        Ok(Self::new(config, modules))
    }

    pub fn module(&self, corner: Corner) -> &SwerveModule {
        &self.modules[corner.index()]
    }

    /// Latest operator axes, set once per tick before `execute`.
    pub fn set_inputs(&mut self, inputs: DriveCommand) {
        self.inputs = inputs;
    }

    // Mode toggles, driven by operator buttons.

    pub fn toggle_field_oriented(&mut self) {
        self.field_oriented = !self.field_oriented;
        info!("field oriented: {}", self.field_oriented);
    }

    pub fn toggle_vision_tracking(&mut self) {
        self.track_vision = !self.track_vision;
        info!("vision tracking: {}", self.track_vision);
    }

    pub fn toggle_range_hold(&mut self) {
        self.range_setpoint = match self.range_setpoint {
            Some(_) => None,
            None => Some(self.config.range_hold_distance),
        };
        info!("range hold: {:?}", self.range_setpoint);
    }

    pub fn toggle_heading_hold(&mut self) {
        self.heading_hold = !self.heading_hold;
        if self.heading_hold {
            // Latch the setpoint from the next tick's heading
            self.relatch_heading = true;
        } else {
            self.momentum = false;
        }
        info!("heading hold: {}", self.heading_hold);
    }

    /// Hold a specific heading (e.g. a POV preset).
    pub fn set_heading_setpoint(&mut self, heading: f64) {
        self.heading_hold = true;
        self.relatch_heading = false;
        self.heading_pid.set_setpoint(normalize(heading));
        info!("heading setpoint: {:.3} rad", self.heading_pid.setpoint());
    }

    pub fn toggle_wheel_lock(&mut self) {
        self.lock_wheels = !self.lock_wheels;
        info!("wheel lock: {}", self.lock_wheels);
    }

    /// Arm the autonomous approach: plan the first distance leg from the
    /// current range/vision readings.
    pub fn start_approach(&mut self, snapshot: &SensorSnapshot) {
        self.leg = self.plan_leg(snapshot);
        if self.leg.is_some() {
            info!("approach armed");
        } else {
            warn!("approach not armed: no range or vision data");
        }
    }

    pub fn cancel_approach(&mut self) {
        if self.leg.take().is_some() {
            info!("approach cancelled");
        }
    }

    pub fn field_oriented(&self) -> bool {
        self.field_oriented
    }

    pub fn heading_hold(&self) -> bool {
        self.heading_hold
    }

    pub fn momentum(&self) -> bool {
        self.momentum
    }

    pub fn track_vision(&self) -> bool {
        self.track_vision
    }

    pub fn lock_wheels(&self) -> bool {
        self.lock_wheels
    }

    pub fn range_setpoint(&self) -> Option<f64> {
        self.range_setpoint
    }

    pub fn distance_leg_active(&self) -> bool {
        self.leg.is_some()
    }

    pub fn heading_setpoint(&self) -> f64 {
        self.heading_pid.setpoint()
    }

    pub fn velocity(&self) -> (f64, f64, f64) {
        (self.vx, self.vy, self.vz)
    }

    /// Plan the next displacement leg from current sensor readings: forward
    /// travel closes the range error, sideways travel centres the vision
    /// target. None when neither source has anything to offer.
    fn plan_leg(&self, snapshot: &SensorSnapshot) -> Option<DistanceLeg> {
        let start = snapshot.odometry_avg()?;

        let dx = match (self.range_setpoint, snapshot.range) {
            (Some(setpoint), Some(range)) => Some(range - setpoint),
            _ => None,
        };
        let dy = snapshot
            .target
            .map(|target| target.x_offset * VISION_STRAFE_GAIN);

        if dx.is_none() && dy.is_none() {
            return None;
        }
        let dx = dx.unwrap_or(0.0);
        let dy = dy.unwrap_or(0.0);

        let displacement = dx.hypot(dy);
        if displacement <= self.config.distance_tolerance {
            return None;
        }

        // The loop closes on unsigned progress from `start`, so a backward
        // leg (heading near pi) completes exactly like a forward one.
        let mut pid = Pid::new(self.config.distance_gains)
            .with_tolerance(self.config.distance_tolerance);
        pid.set_setpoint(displacement);
        debug!(
            "planned leg: {:.3} m at {:.3} rad",
            displacement,
            dy.atan2(dx)
        );

        Some(DistanceLeg {
            heading: dy.atan2(dx),
            start,
            pid,
        })
    }

    /// One control tick. Sensor data is a pre-arbitration snapshot; actuator
    /// failures are logged and never interrupt the tick.
    pub fn execute(&mut self, snapshot: &SensorSnapshot, dt: f64) {
        let inputs = self.inputs;
        let manual_translation = inputs.vx.abs() > MANUAL_INPUT_THRESHOLD
            || inputs.vy.abs() > MANUAL_INPUT_THRESHOLD;
        let manual_twist = inputs.vz.abs() > MANUAL_INPUT_THRESHOLD;

        // Manual control always preempts autonomous behavior.
        if (manual_translation || manual_twist) && self.leg.is_some() {
            info!("manual input, disarming distance leg");
            self.leg = None;
        }
        if manual_translation && self.track_vision {
            info!("manual input, dropping vision tracking");
            self.track_vision = false;
        }

        let mut vx = inputs.vx;
        let mut vy = inputs.vy;
        let mut throttle = inputs.throttle;
        let mut field_oriented = self.field_oriented;

        // Range hold: drive the forward axis to close the range error.
        if let Some(setpoint) = self.range_setpoint {
            if let Some(range) = snapshot.range {
                vx = rescale_rate(range - setpoint, SENSOR_DRIVE_RATE);
                throttle = Some(1.0);
                field_oriented = false;
            }
            // No fresh range: keep the operator's vx this tick.
        }

        // Vision tracking: strafe to centre the target. A stale or absent
        // target contributes nothing.
        if self.track_vision {
            if let Some(target) = snapshot.target {
                vy = rescale_rate(target.x_offset, SENSOR_DRIVE_RATE);
                throttle = Some(1.0);
                field_oriented = false;
            }
        }

        // Autonomous distance leg: highest-priority override of vx/vy.
        self.last_leg_output = 0.0;
        if let Some(mut leg) = self.leg.take() {
            match snapshot.odometry_avg() {
                Some(avg) => {
                    let progress = (avg - leg.start).abs();
                    if leg.pid.on_target(progress) {
                        // Leg complete: chain the next one, or hand back to
                        // the operator if range and vision have both gone
                        // quiet.
                        self.leg = self.plan_leg(snapshot);
                        if self.leg.is_none() {
                            info!("approach complete, manual control resumes");
                        }
                        vx = 0.0;
                        vy = 0.0;
                        throttle = Some(1.0);
                        field_oriented = false;
                    } else {
                        let output = leg.pid.update(progress, dt);
                        self.last_leg_output = output;
                        vx = output * leg.heading.cos();
                        vy = output * leg.heading.sin();
                        throttle = Some(1.0);
                        field_oriented = false;
                        self.leg = Some(leg);
                    }
                }
                None => {
                    warn!("odometry unavailable, disarming distance leg");
                }
            }
        }

        // Field orientation of the manual translation input.
        if field_oriented && inputs.throttle.is_some() {
            (vx, vy) = field_orient(vx, vy, snapshot.heading);
        }

        // Heading hold / momentum supplies vz unless the driver is turning.
        let mut vz = inputs.vz;
        if self.heading_hold {
            if self.relatch_heading {
                self.heading_pid.set_setpoint(snapshot.heading);
                self.relatch_heading = false;
            }
            let settling = self.momentum && snapshot.heading_rate.abs() > GYRO_SETTLED_RATE;
            if manual_twist || settling {
                // Track the manual turn so the hold controller neither
                // fights the driver nor winds up.
                self.momentum = true;
                self.heading_pid.set_setpoint(snapshot.heading);
                vz = inputs.vz;
            } else {
                self.momentum = false;
                vz = self.heading_pid.update(snapshot.heading, dt);
            }
        }

        // Wheel lock overrides everything: X pose, no drive. The published
        // command is zeroed to match what the modules actually received.
        if self.lock_wheels {
            self.vx = 0.0;
            self.vy = 0.0;
            self.vz = 0.0;
            self.throttle = None;
            self.lock_pose();
            return;
        }

        self.vx = vx;
        self.vy = vy;
        self.vz = vz;
        self.throttle = throttle;

        self.drive(vx, vy, vz, throttle);
    }

    /// Decompose a body motion command into per-module steering commands.
    /// `throttle` of None re-points the wheels without driving.
    pub fn drive(&mut self, vx: f64, vy: f64, vz: f64, throttle: Option<f64>) {
        let polar = target_vectors(&self.config.geometry, vx, vy, vz);

        for (module, (direction, magnitude)) in self.modules.iter_mut().zip(polar) {
            // A zero-magnitude target has no direction; hold the current one.
            let direction = if magnitude < 1e-12 {
                module.direction()
            } else {
                direction
            };
            let speed = throttle.map(|t| magnitude * t);

            if let Err(e) = module.steer(direction, speed) {
                warn!("module {}: steer failed: {}", module.corner().name(), e);
            }
        }
    }

    /// Pre-position every wheel perpendicular to its rotation vector: the
    /// defensive X pose, unpushable and driving nowhere.
    fn lock_pose(&mut self) {
        for (module, corner) in self.modules.iter_mut().zip(Corner::ALL) {
            let (rx, ry) = self.config.geometry.rotation_vector(corner);
            let direction = normalize(ry.atan2(rx) + FRAC_PI_2);
            if let Err(e) = module.steer(direction, None) {
                warn!("module {}: lock steer failed: {}", module.corner().name(), e);
            }
        }
    }

    /// Read-only snapshot for the telemetry publisher.
    pub fn telemetry(&mut self) -> ChassisTelemetry {
        let mut modules = [ModuleTelemetry::default(); 4];
        for (out, module) in modules.iter_mut().zip(self.modules.iter_mut()) {
            *out = ModuleTelemetry {
                direction: module.direction(),
                speed: module.speed(),
                distance: module.distance(),
                drive_current: module.drive_current(),
            };
        }

        ChassisTelemetry {
            vx: self.vx,
            vy: self.vy,
            vz: self.vz,
            throttle: self.throttle,
            field_oriented: self.field_oriented,
            heading_hold: self.heading_hold,
            momentum: self.momentum,
            track_vision: self.track_vision,
            lock_wheels: self.lock_wheels,
            range_setpoint: self.range_setpoint,
            heading_setpoint: self.heading_pid.setpoint(),
            heading_pid_output: self.heading_pid.last_output(),
            distance_leg_active: self.leg.is_some(),
            distance_pid_output: self.last_leg_output,
            modules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::TargetReading;

    const DT: f64 = 0.02;
    const EPSILON: f64 = 1e-6;

    /// Standard geometry with neutral calibration, so module directions
    /// start at zero and drive signs are unflipped.
    fn test_config() -> RobotConfig {
        let mut config = RobotConfig::standard();
        for setup in &mut config.modules {
            setup.calibration.zero_reading = 256.0;
            setup.calibration.reverse_drive = false;
            setup.calibration.reverse_steer = false;
        }
        config
    }

    fn test_chassis() -> Chassis {
        let mut chassis = Chassis::offline(test_config()).unwrap();
        // Tests drive the arbiter directly; start robot-oriented.
        chassis.field_oriented = false;
        chassis
    }

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot::default()
    }

    #[test]
    fn zero_command_stops_every_module() {
        let mut chassis = test_chassis();
        chassis.drive(0.0, 0.0, 0.0, Some(0.8));
        for corner in Corner::ALL {
            assert_eq!(chassis.module(corner).speed(), 0.0);
        }
    }

    #[test]
    fn zero_command_without_throttle_holds_pose() {
        let mut chassis = test_chassis();
        chassis.drive(0.5, 0.5, 0.0, Some(1.0));
        let before: Vec<f64> = Corner::ALL
            .iter()
            .map(|c| chassis.module(*c).direction())
            .collect();

        chassis.set_inputs(DriveCommand::default());
        chassis.execute(&snapshot(), DT);

        for (corner, previous) in Corner::ALL.iter().zip(before) {
            let module = chassis.module(*corner);
            assert_eq!(module.speed(), 0.0);
            assert!((module.direction() - previous).abs() < EPSILON);
        }
    }

    #[test]
    fn pure_forward_points_all_modules_the_same_way() {
        let mut chassis = test_chassis();
        chassis.drive(1.0, 0.0, 0.0, Some(1.0));
        for corner in Corner::ALL {
            let module = chassis.module(corner);
            assert!(module.direction().abs() < EPSILON);
            assert!((module.speed().abs() - 1.0).abs() < EPSILON);
        }
    }

    #[test]
    fn pure_rotation_targets_match_reference_geometry() {
        let config = test_config();
        let polar = target_vectors(&config.geometry, 0.0, 0.0, 1.0);

        // Corner a: rotation vector (-0.7695, 0.6387)
        let (dir_a, mag_a) = polar[0];
        assert!((dir_a - 0.6387f64.atan2(-0.7695)).abs() < 1e-3);
        assert!((dir_a - 2.446).abs() < 5e-3);
        assert!(mag_a <= 1.0 + EPSILON);

        // Symmetric corners mirror per sign pattern, all magnitudes equal
        for (_, mag) in polar {
            assert!((mag - mag_a).abs() < EPSILON);
        }
        let (dir_c, _) = polar[2];
        assert!((normalize(dir_a - dir_c).abs() - std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn saturated_commands_scale_jointly() {
        let config = test_config();
        let polar = target_vectors(&config.geometry, 1.0, 0.0, 1.0);
        let max = polar.iter().map(|(_, m)| *m).fold(0.0, f64::max);
        assert!((max - 1.0).abs() < EPSILON);
        for (_, mag) in polar {
            assert!(mag <= 1.0 + EPSILON);
        }
    }

    #[test]
    fn field_orient_identity_at_zero_heading() {
        let (x, y) = field_orient(0.3, -0.7, 0.0);
        assert!((x - 0.3).abs() < EPSILON);
        assert!((y - -0.7).abs() < EPSILON);
    }

    #[test]
    fn field_orient_round_trip() {
        let heading = 0.9;
        let (x, y) = field_orient(0.4, 0.2, heading);
        let (rx, ry) = field_orient(x, y, -heading);
        assert!((rx - 0.4).abs() < EPSILON);
        assert!((ry - 0.2).abs() < EPSILON);
    }

    #[test]
    fn momentum_latches_while_turning_and_reverts_when_settled() {
        let mut chassis = test_chassis();
        chassis.toggle_heading_hold();

        // Driver turning: momentum engages, setpoint follows the heading
        chassis.set_inputs(DriveCommand {
            vz: 0.5,
            throttle: Some(1.0),
            ..Default::default()
        });
        let mut s = snapshot();
        s.heading = 1.0;
        s.heading_rate = 1.0;
        chassis.execute(&s, DT);
        assert!(chassis.momentum());
        assert!((chassis.heading_setpoint() - 1.0).abs() < EPSILON);
        let (_, _, vz) = chassis.velocity();
        assert!((vz - 0.5).abs() < EPSILON);

        // Stick released but still rotating: setpoint keeps tracking
        chassis.set_inputs(DriveCommand {
            throttle: Some(1.0),
            ..Default::default()
        });
        s.heading = 1.2;
        s.heading_rate = 0.4;
        chassis.execute(&s, DT);
        assert!(chassis.momentum());
        assert!((chassis.heading_setpoint() - 1.2).abs() < EPSILON);

        // Gyro settled: closed loop resumes at the last latched heading
        s.heading = 1.2;
        s.heading_rate = 0.01;
        chassis.execute(&s, DT);
        assert!(!chassis.momentum());
        assert!((chassis.heading_setpoint() - 1.2).abs() < EPSILON);
        let (_, _, vz) = chassis.velocity();
        assert!(vz.abs() < EPSILON);
    }

    #[test]
    fn heading_hold_steers_towards_setpoint() {
        let mut chassis = test_chassis();
        chassis.set_heading_setpoint(0.5);
        chassis.set_inputs(DriveCommand {
            throttle: Some(1.0),
            ..Default::default()
        });
        let s = snapshot(); // heading 0
        chassis.execute(&s, DT);
        let (_, _, vz) = chassis.velocity();
        // kp 0.5 * error 0.5
        assert!((vz - 0.25).abs() < EPSILON);
    }

    #[test]
    fn approach_tracks_then_completes_and_disarms() {
        let mut chassis = test_chassis();
        chassis.toggle_range_hold(); // 2 m station keeping

        let mut s = snapshot();
        s.range = Some(3.0);
        s.odometry = Some((0.0, 0.0));
        chassis.start_approach(&s);
        assert!(chassis.distance_leg_active());

        // Tracking: full metre of error saturates the distance PID
        chassis.set_inputs(DriveCommand {
            throttle: Some(1.0),
            ..Default::default()
        });
        chassis.execute(&s, DT);
        let (vx, vy, _) = chassis.velocity();
        assert!((vx - 1.0).abs() < EPSILON);
        assert!(vy.abs() < EPSILON);

        // On target with range and vision both quiet: leg disables
        s.range = None;
        s.odometry = Some((0.98, 0.98));
        chassis.execute(&s, DT);
        assert!(!chassis.distance_leg_active());
    }

    #[test]
    fn approach_chains_a_new_leg_while_range_error_remains() {
        let mut chassis = test_chassis();
        chassis.toggle_range_hold();

        let mut s = snapshot();
        s.range = Some(3.0);
        s.odometry = Some((0.0, 0.0));
        chassis.start_approach(&s);

        // Leg completes but the range still reads long: a new leg is planned
        s.range = Some(2.4);
        s.odometry = Some((1.0, 1.0));
        chassis.set_inputs(DriveCommand {
            throttle: Some(1.0),
            ..Default::default()
        });
        chassis.execute(&s, DT);
        assert!(chassis.distance_leg_active());
    }

    #[test]
    fn too_close_range_hold_backs_up_and_completes() {
        let mut chassis = test_chassis();
        chassis.toggle_range_hold(); // 2 m station keeping

        // Half a metre too close: the planned leg points backwards
        let mut s = snapshot();
        s.range = Some(1.5);
        s.odometry = Some((0.0, 0.0));
        chassis.start_approach(&s);
        assert!(chassis.distance_leg_active());

        chassis.set_inputs(DriveCommand {
            throttle: Some(1.0),
            ..Default::default()
        });
        chassis.execute(&s, DT);
        let (vx, vy, _) = chassis.velocity();
        assert!((vx - -0.5).abs() < EPSILON);
        assert!(vy.abs() < EPSILON);

        // Backed up the planned half metre, range restored: leg completes
        // instead of winding further into reverse
        s.range = Some(2.0);
        s.odometry = Some((-0.5, -0.5));
        chassis.execute(&s, DT);
        assert!(!chassis.distance_leg_active());
        let (vx, _, _) = chassis.velocity();
        assert_eq!(vx, 0.0);
    }

    #[test]
    fn manual_input_disarms_approach() {
        let mut chassis = test_chassis();
        chassis.toggle_range_hold();

        let mut s = snapshot();
        s.range = Some(3.0);
        s.odometry = Some((0.0, 0.0));
        chassis.start_approach(&s);
        assert!(chassis.distance_leg_active());

        chassis.set_inputs(DriveCommand {
            vx: 0.5,
            throttle: Some(1.0),
            ..Default::default()
        });
        chassis.execute(&s, DT);
        assert!(!chassis.distance_leg_active());
    }

    #[test]
    fn vision_tracking_strafes_towards_target() {
        let mut chassis = test_chassis();
        chassis.toggle_vision_tracking();

        let mut s = snapshot();
        s.target = Some(TargetReading {
            x_offset: 0.5,
            y_offset: 0.0,
            width: 20.0,
            height: 10.0,
        });
        chassis.set_inputs(DriveCommand {
            throttle: Some(0.5),
            ..Default::default()
        });
        chassis.execute(&s, DT);
        let (_, vy, _) = chassis.velocity();
        assert!((vy - 0.15).abs() < EPSILON);
        assert_eq!(chassis.telemetry().throttle, Some(1.0));
    }

    #[test]
    fn stale_vision_contributes_nothing() {
        let mut chassis = test_chassis();
        chassis.toggle_vision_tracking();
        chassis.set_inputs(DriveCommand {
            throttle: Some(1.0),
            ..Default::default()
        });
        chassis.execute(&snapshot(), DT);
        let (_, vy, _) = chassis.velocity();
        assert_eq!(vy, 0.0);
        assert!(chassis.track_vision());
    }

    #[test]
    fn wheel_lock_poses_perpendicular_to_rotation_vectors() {
        let mut chassis = test_chassis();
        chassis.toggle_wheel_lock();
        chassis.set_inputs(DriveCommand {
            vx: 1.0,
            throttle: Some(1.0),
            ..Default::default()
        });
        chassis.execute(&snapshot(), DT);

        // The sticks were ignored; telemetry says so
        let (vx, vy, vz) = chassis.velocity();
        assert_eq!((vx, vy, vz), (0.0, 0.0, 0.0));
        assert!(chassis.telemetry().throttle.is_none());

        for corner in Corner::ALL {
            let (rx, ry) = test_config().geometry.rotation_vector(corner);
            let expected = normalize(ry.atan2(rx) + FRAC_PI_2);
            let module = chassis.module(corner);
            assert_eq!(module.speed(), 0.0);
            assert!(
                (normalize(module.direction()) - expected).abs() < 1e-6,
                "corner {} at {} expected {}",
                corner.name(),
                module.direction(),
                expected
            );
        }
    }

    #[test]
    fn range_hold_drives_towards_the_setpoint() {
        let mut chassis = test_chassis();
        chassis.toggle_range_hold();

        let mut s = snapshot();
        s.range = Some(2.5);
        chassis.set_inputs(DriveCommand {
            throttle: Some(0.3),
            ..Default::default()
        });
        chassis.execute(&s, DT);
        let (vx, _, _) = chassis.velocity();
        // 0.5 m long of the 2 m setpoint, rate 0.3
        assert!((vx - 0.15).abs() < EPSILON);
    }
}
