// Message types on the zenoh topics.

use serde::{Deserialize, Serialize};

/// Operator drive input from teleop -> runtime.
///
/// Axes are pre-shaped [-1, 1] values; `throttle` in [0, 1] scales drive
/// output, and `None` means re-point the wheels without driving.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct DriveCommand {
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub throttle: Option<f64>,
}

/// Discrete operator actions from teleop -> runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "cmd", content = "value")]
pub enum ModeCommand {
    ToggleFieldOriented,
    ToggleHeadingHold,
    ToggleVisionTracking,
    ToggleRangeHold,
    ToggleWheelLock,
    /// Hold a specific heading, radians.
    SetHeadingSetpoint(f64),
    ResetHeading,
    /// Arm the autonomous approach (distance-leg sequencing).
    StartApproach,
    CancelApproach,
}

/// Orientation sample published by the IMU collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ImuMessage {
    pub yaw: f64,
    pub yaw_rate: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Raw range sample, metres.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RangeMessage {
    pub distance: f64,
}

/// Two independent drive-wheel odometry readings, metres.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OdometryMessage {
    pub left: f64,
    pub right: f64,
}

/// Result record from the vision pipeline. Offsets are normalized across
/// the frame; `has_target` distinguishes "no target" from a centred one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TargetMessage {
    pub x_offset: f64,
    pub y_offset: f64,
    pub width: f64,
    pub height: f64,
    pub has_target: bool,
}

/// Per-module state for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ModuleTelemetry {
    pub direction: f64,
    pub speed: f64,
    pub distance: Option<f64>,
    pub drive_current: Option<f64>,
}

/// Read-only chassis snapshot published once per tick.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChassisTelemetry {
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub throttle: Option<f64>,
    pub field_oriented: bool,
    pub heading_hold: bool,
    pub momentum: bool,
    pub track_vision: bool,
    pub lock_wheels: bool,
    pub range_setpoint: Option<f64>,
    pub heading_setpoint: f64,
    pub heading_pid_output: f64,
    pub distance_leg_active: bool,
    pub distance_pid_output: f64,
    /// Modules in corner order a, b, c, d.
    pub modules: [ModuleTelemetry; 4],
}

/// Health status published by the runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
