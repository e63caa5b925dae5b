// Motor control module
//
// Provides:
// - Serial register protocol to the motor controllers
// - The Actuator trait the chassis drives modules through
// - Bus-backed and offline (simulation) actuator implementations

pub mod actuator;
pub mod bus;

pub use actuator::{
    ActuationError, Actuator, ActuatorConfig, BusActuator, ControlMode, FeedbackDevice,
    OfflineActuator,
};
pub use bus::{BusError, MotorBus};
