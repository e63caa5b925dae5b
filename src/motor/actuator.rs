// Actuator abstraction over the motor controllers.
//
// A swerve module owns two of these (steer + drive). The trait is the whole
// interface the control core needs: set a target in one of three control
// modes, read back the commanded setpoint cheaply, and read feedback. The
// bus-backed implementation talks the serial protocol; the offline one just
// records targets, for simulation and tests.

use std::sync::{Arc, Mutex};

use tracing::debug;

use super::bus::{BusError, MotorBus, Register};
use crate::chassis::pid::PidGains;

/// Controller output modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    DutyCycle,
    Velocity,
    Position,
}

impl ControlMode {
    fn register_value(self) -> u8 {
        match self {
            ControlMode::DutyCycle => 0,
            ControlMode::Velocity => 1,
            ControlMode::Position => 2,
        }
    }
}

/// Feedback device wired to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackDevice {
    None,
    Quadrature,
    AnalogAbsolute,
}

impl FeedbackDevice {
    fn register_value(self) -> u8 {
        match self {
            FeedbackDevice::None => 0,
            FeedbackDevice::Quadrature => 1,
            FeedbackDevice::AnalogAbsolute => 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActuationError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("motor bus unavailable")]
    BusUnavailable,
}

/// One motor controller as the control core sees it.
///
/// `setpoint` must be a cheap local read: the chassis derives each module's
/// current direction from it every tick.
pub trait Actuator {
    /// Switch control modes, re-applying the mode's closed-loop gains first.
    fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), ActuationError>;

    fn set_position_target(&mut self, counts: f64) -> Result<(), ActuationError>;
    fn set_velocity_target(&mut self, counts_per_sec: f64) -> Result<(), ActuationError>;
    fn set_duty_cycle(&mut self, fraction: f64) -> Result<(), ActuationError>;

    /// Last commanded target, in the units of the active control mode.
    fn setpoint(&self) -> f64;

    fn position(&mut self) -> Result<f64, ActuationError>;
    fn closed_loop_error(&mut self) -> Result<f64, ActuationError>;
    /// Output current in amps.
    fn output_current(&mut self) -> Result<f64, ActuationError>;
}

/// Fixed per-controller configuration, applied once at construction.
#[derive(Debug, Clone, Copy)]
pub struct ActuatorConfig {
    pub id: u8,
    pub feedback: FeedbackDevice,
    pub invert_output: bool,
    pub invert_sensor: bool,
    pub position_gains: PidGains,
    pub velocity_gains: PidGains,
}

/// Actuator backed by a controller on the shared serial bus.
pub struct BusActuator {
    bus: Arc<Mutex<MotorBus>>,
    config: ActuatorConfig,
    mode: Option<ControlMode>,
    setpoint: f64,
}

impl BusActuator {
    pub fn new(bus: Arc<Mutex<MotorBus>>, config: ActuatorConfig) -> Result<Self, ActuationError> {
        {
            let mut bus = bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
            let id = config.id;
            bus.write_u8(id, Register::FeedbackDevice, config.feedback.register_value())?;
            bus.write_u8(id, Register::InvertOutput, config.invert_output as u8)?;
            bus.write_u8(id, Register::InvertSensor, config.invert_sensor as u8)?;
        }
        Ok(Self {
            bus,
            config,
            mode: None,
            setpoint: 0.0,
        })
    }

    fn apply_gains(bus: &mut MotorBus, id: u8, gains: PidGains) -> Result<(), BusError> {
        // Gains travel as thousandths
        bus.write_u16(id, Register::GainP, (gains.kp * 1000.0) as u16)?;
        bus.write_u16(id, Register::GainI, (gains.ki * 1000.0) as u16)?;
        bus.write_u16(id, Register::GainD, (gains.kd * 1000.0) as u16)
    }

    fn ensure_mode(&mut self, mode: ControlMode) -> Result<(), ActuationError> {
        if self.mode == Some(mode) {
            return Ok(());
        }
        self.set_control_mode(mode)
    }
}

impl Actuator for BusActuator {
    fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), ActuationError> {
        let mut bus = self.bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
        let id = self.config.id;
        debug!("controller {}: switching to {:?}", id, mode);

        // Gains first, so the controller never runs a mode with the previous
        // mode's loop constants.
        match mode {
            ControlMode::Position => Self::apply_gains(&mut bus, id, self.config.position_gains)?,
            ControlMode::Velocity => Self::apply_gains(&mut bus, id, self.config.velocity_gains)?,
            ControlMode::DutyCycle => {}
        }
        bus.write_u8(id, Register::ControlMode, mode.register_value())?;
        drop(bus);

        self.mode = Some(mode);
        Ok(())
    }

    fn set_position_target(&mut self, counts: f64) -> Result<(), ActuationError> {
        self.ensure_mode(ControlMode::Position)?;
        let mut bus = self.bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
        bus.write_i32(self.config.id, Register::GoalPosition, counts.round() as i32)?;
        drop(bus);
        self.setpoint = counts;
        Ok(())
    }

    fn set_velocity_target(&mut self, counts_per_sec: f64) -> Result<(), ActuationError> {
        self.ensure_mode(ControlMode::Velocity)?;
        let mut bus = self.bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
        bus.write_i32(
            self.config.id,
            Register::GoalVelocity,
            counts_per_sec.round() as i32,
        )?;
        drop(bus);
        self.setpoint = counts_per_sec;
        Ok(())
    }

    fn set_duty_cycle(&mut self, fraction: f64) -> Result<(), ActuationError> {
        self.ensure_mode(ControlMode::DutyCycle)?;
        let per_mille = (fraction.clamp(-1.0, 1.0) * 1000.0).round() as i16;
        let mut bus = self.bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
        bus.write_i16(self.config.id, Register::DutyCycle, per_mille)?;
        drop(bus);
        self.setpoint = fraction;
        Ok(())
    }

    fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn position(&mut self) -> Result<f64, ActuationError> {
        let mut bus = self.bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
        Ok(bus.read_i32(self.config.id, Register::PresentPosition)? as f64)
    }

    fn closed_loop_error(&mut self) -> Result<f64, ActuationError> {
        let mut bus = self.bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
        Ok(bus.read_i32(self.config.id, Register::ClosedLoopError)? as f64)
    }

    fn output_current(&mut self) -> Result<f64, ActuationError> {
        let mut bus = self.bus.lock().map_err(|_| ActuationError::BusUnavailable)?;
        Ok(bus.read_u16(self.config.id, Register::OutputCurrent)? as f64 / 1000.0)
    }
}

/// Actuator that only records its targets. Used when the runtime starts
/// without hardware, and by the chassis tests.
#[derive(Debug, Default)]
pub struct OfflineActuator {
    mode: Option<ControlMode>,
    setpoint: f64,
    present_position: f64,
}

impl OfflineActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<ControlMode> {
        self.mode
    }

    /// Simulated encoder feedback for tests.
    pub fn set_present_position(&mut self, counts: f64) {
        self.present_position = counts;
    }
}

impl Actuator for OfflineActuator {
    fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), ActuationError> {
        self.mode = Some(mode);
        Ok(())
    }

    fn set_position_target(&mut self, counts: f64) -> Result<(), ActuationError> {
        self.mode = Some(ControlMode::Position);
        self.setpoint = counts;
        Ok(())
    }

    fn set_velocity_target(&mut self, counts_per_sec: f64) -> Result<(), ActuationError> {
        self.mode = Some(ControlMode::Velocity);
        self.setpoint = counts_per_sec;
        Ok(())
    }

    fn set_duty_cycle(&mut self, fraction: f64) -> Result<(), ActuationError> {
        self.mode = Some(ControlMode::DutyCycle);
        self.setpoint = fraction.clamp(-1.0, 1.0);
        Ok(())
    }

    fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn position(&mut self) -> Result<f64, ActuationError> {
        Ok(self.present_position)
    }

    fn closed_loop_error(&mut self) -> Result<f64, ActuationError> {
        Ok(0.0)
    }

    fn output_current(&mut self) -> Result<f64, ActuationError> {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_actuator_tracks_mode_and_setpoint() {
        let mut actuator = OfflineActuator::new();
        actuator.set_duty_cycle(0.5).unwrap();
        assert_eq!(actuator.mode(), Some(ControlMode::DutyCycle));
        assert_eq!(actuator.setpoint(), 0.5);

        actuator.set_position_target(1024.0).unwrap();
        assert_eq!(actuator.mode(), Some(ControlMode::Position));
        assert_eq!(actuator.setpoint(), 1024.0);
    }

    #[test]
    fn offline_duty_cycle_is_clamped() {
        let mut actuator = OfflineActuator::new();
        actuator.set_duty_cycle(2.5).unwrap();
        assert_eq!(actuator.setpoint(), 1.0);
        actuator.set_duty_cycle(-2.5).unwrap();
        assert_eq!(actuator.setpoint(), -1.0);
    }
}
