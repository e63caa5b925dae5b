// 50 Hz control loop with watchdog
//
// Per tick, strictly in order: drain sensor samples, assemble one snapshot,
// apply operator mode commands, apply the drive-input watchdog, run the
// chassis arbiter, publish telemetry and health. If teleop dies the watchdog
// zeroes the motion command rather than driving on the last stick values.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::{info, warn};

use crate::chassis::module::SwerveModule;
use crate::chassis::pid::PidGains;
use crate::chassis::Chassis;
use crate::config::{
    RobotConfig, CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_DRIVE, TOPIC_CMD_MODE, TOPIC_HEALTH, TOPIC_IMU,
    TOPIC_ODOMETRY, TOPIC_RANGE, TOPIC_TARGET, TOPIC_TELEMETRY,
};
use crate::messages::{
    DriveCommand, ImuMessage, ModeCommand, OdometryMessage, RangeMessage, RuntimeHealth,
    TargetMessage,
};
use crate::motor::{ActuatorConfig, BusActuator, BusError, FeedbackDevice, MotorBus};
use crate::sensor::imu::ImuSample;
use crate::sensor::{HeadingTracker, RangeFilter, SensorSnapshot, TargetChannel, TargetReading};

pub struct RuntimeOptions {
    /// Serial port of the motor-controller bus; None runs on offline
    /// actuators for simulation and bench testing.
    pub serial_port: Option<String>,
}

struct Runtime {
    chassis: Chassis,
    heading: HeadingTracker,
    range: RangeFilter,
    odometry: Option<(f64, f64)>,
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    fn new(chassis: Chassis) -> Self {
        Self {
            chassis,
            heading: HeadingTracker::new(),
            range: RangeFilter::new(),
            odometry: None,
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    fn on_drive_command(&mut self, cmd: DriveCommand) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    fn on_mode_command(&mut self, cmd: ModeCommand, snapshot: &SensorSnapshot) {
        match cmd {
            ModeCommand::ToggleFieldOriented => self.chassis.toggle_field_oriented(),
            ModeCommand::ToggleHeadingHold => self.chassis.toggle_heading_hold(),
            ModeCommand::ToggleVisionTracking => self.chassis.toggle_vision_tracking(),
            ModeCommand::ToggleRangeHold => self.chassis.toggle_range_hold(),
            ModeCommand::ToggleWheelLock => self.chassis.toggle_wheel_lock(),
            ModeCommand::SetHeadingSetpoint(heading) => {
                self.chassis.set_heading_setpoint(heading)
            }
            ModeCommand::ResetHeading => {
                self.heading.reset_heading();
                info!("heading reset");
            }
            ModeCommand::StartApproach => self.chassis.start_approach(snapshot),
            ModeCommand::CancelApproach => self.chassis.cancel_approach(),
        }
    }

    /// Drive input after the watchdog: stale commands become zero motion.
    fn watchdogged_inputs(&mut self) -> DriveCommand {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            if self.health != RuntimeHealth::CmdStale {
                warn!("drive command stale ({:?} old), stopping", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::default()
        } else if let Some(cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            cmd
        } else {
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::default()
        }
    }
}

/// Build the chassis on the serial bus, or on offline actuators when no
/// port is given.
fn build_chassis(
    config: RobotConfig,
    serial_port: Option<&str>,
) -> Result<Chassis, Box<dyn std::error::Error + Send + Sync>> {
    let Some(port) = serial_port else {
        info!("no serial port given, running on offline actuators");
        return Ok(Chassis::offline(config)?);
    };

    info!("opening motor bus on {}", port);
    let bus = Arc::new(Mutex::new(MotorBus::open(port)?));

    // Every controller must answer before any of them gets configured
    {
        let mut bus = bus.lock().map_err(|_| "motor bus lock poisoned")?;
        for setup in &config.modules {
            for id in [setup.steer_id, setup.drive_id] {
                if !bus.ping(id)? {
                    return Err(Box::new(BusError::Timeout { id }));
                }
            }
        }
    }

    let mut modules = Vec::with_capacity(4);
    for setup in &config.modules {
        let cal = setup.calibration;

        let steer = BusActuator::new(
            bus.clone(),
            ActuatorConfig {
                id: setup.steer_id,
                feedback: if cal.absolute_steer {
                    FeedbackDevice::AnalogAbsolute
                } else {
                    FeedbackDevice::Quadrature
                },
                // Sensor follows the steering ring; output opposes it
                invert_output: !cal.reverse_steer,
                invert_sensor: cal.reverse_steer,
                position_gains: RobotConfig::steer_gains(&cal),
                velocity_gains: PidGains::p(0.0),
            },
        )?;

        let drive = BusActuator::new(
            bus.clone(),
            ActuatorConfig {
                id: setup.drive_id,
                feedback: if cal.has_drive_encoder {
                    FeedbackDevice::Quadrature
                } else {
                    FeedbackDevice::None
                },
                // Drive reversal is handled in the steering optimization
                invert_output: false,
                invert_sensor: false,
                position_gains: PidGains::p(0.0),
                velocity_gains: RobotConfig::drive_gains(),
            },
        )?;

        modules.push(SwerveModule::new(cal, Box::new(steer), Box::new(drive))?);
    }

    let modules = match modules.try_into() {
        Ok(m) => m,
        Err(_) => unreachable!("built exactly four modules"),
    };
    Ok(Chassis::new(config, modules))
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = RobotConfig::standard();
    let chassis = build_chassis(config, options.serial_port.as_deref())?;

    info!("opening zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let sub_drive = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_mode = session.declare_subscriber(TOPIC_CMD_MODE).await?;
    let sub_imu = session.declare_subscriber(TOPIC_IMU).await?;
    let sub_range = session.declare_subscriber(TOPIC_RANGE).await?;
    let sub_odometry = session.declare_subscriber(TOPIC_ODOMETRY).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    // The vision pipeline runs concurrently; its records land in a torn-safe
    // snapshot channel the control loop reads once per tick.
    let target_channel = Arc::new(TargetChannel::new());
    let sub_target = session.declare_subscriber(TOPIC_TARGET).await?;
    let vision_channel = target_channel.clone();
    tokio::spawn(async move {
        while let Ok(sample) = sub_target.recv_async().await {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<TargetMessage>(&payload) {
                Ok(msg) => {
                    let reading = msg.has_target.then_some(TargetReading {
                        x_offset: msg.x_offset,
                        y_offset: msg.y_offset,
                        width: msg.width,
                        height: msg.height,
                    });
                    vision_channel.publish(reading);
                }
                Err(e) => warn!("bad target record: {}", e),
            }
        }
    });

    let mut runtime = Runtime::new(chassis);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    let dt = 1.0 / LOOP_HZ as f64;

    info!(
        "runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("subscribed to: {}, {}", TOPIC_CMD_DRIVE, TOPIC_CMD_MODE);
    info!("publishing to: {}, {}", TOPIC_TELEMETRY, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain pending sensor samples (non-blocking), keep the latest
        while let Ok(Some(sample)) = sub_imu.try_recv() {
            if let Ok(msg) = serde_json::from_slice::<ImuMessage>(&sample.payload().to_bytes()) {
                runtime.heading.update(ImuSample {
                    yaw: msg.yaw,
                    yaw_rate: msg.yaw_rate,
                    pitch: msg.pitch,
                    roll: msg.roll,
                });
            }
        }
        while let Ok(Some(sample)) = sub_range.try_recv() {
            if let Ok(msg) = serde_json::from_slice::<RangeMessage>(&sample.payload().to_bytes()) {
                runtime.range.update(msg.distance);
            }
        }
        while let Ok(Some(sample)) = sub_odometry.try_recv() {
            if let Ok(msg) =
                serde_json::from_slice::<OdometryMessage>(&sample.payload().to_bytes())
            {
                runtime.odometry = Some((msg.left, msg.right));
            }
        }

        // 2. One sensor snapshot for the whole tick
        let snapshot = SensorSnapshot {
            heading: runtime.heading.heading(),
            heading_rate: runtime.heading.heading_rate(),
            pitch: runtime.heading.pitch(),
            roll: runtime.heading.roll(),
            range: runtime.range.distance(),
            target: target_channel.latest(),
            odometry: runtime.odometry,
        };

        // 3. Operator commands
        while let Ok(Some(sample)) = sub_mode.try_recv() {
            match serde_json::from_slice::<ModeCommand>(&sample.payload().to_bytes()) {
                Ok(cmd) => runtime.on_mode_command(cmd, &snapshot),
                Err(e) => warn!("failed to parse mode command: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_drive.try_recv() {
            match serde_json::from_slice::<DriveCommand>(&sample.payload().to_bytes()) {
                Ok(cmd) => runtime.on_drive_command(cmd),
                Err(e) => warn!("failed to parse drive command: {}", e),
            }
        }

        // 4. Arbitrate and actuate
        let inputs = runtime.watchdogged_inputs();
        runtime.chassis.set_inputs(inputs);
        runtime.chassis.execute(&snapshot, dt);

        // 5. Publish telemetry and health
        let telemetry_json = serde_json::to_string(&runtime.chassis.telemetry())?;
        pub_telemetry.put(telemetry_json).await?;

        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}
