// Serial protocol for the motor controllers.
//
// The steer and drive controllers sit on a shared half-duplex serial bus and
// speak a register-based framed protocol:
//
//   [0xA5, 0x5A, ID, Length, Instruction, Params..., Checksum]
//
// Length counts instruction + params + checksum. The checksum is the
// complement of the byte sum over everything after the header. Registers
// cover mode/gain configuration and the goal/feedback values the control
// loop needs; wide values are little-endian.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

const HEADER: [u8; 2] = [0xA5, 0x5A];

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Controller register map.
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    // Configuration
    ControlMode = 0x10,    // 1 byte: 0=duty, 1=velocity, 2=position
    FeedbackDevice = 0x11, // 1 byte: 0=none, 1=quadrature, 2=analog absolute
    InvertOutput = 0x12,   // 1 byte: 0/1
    InvertSensor = 0x13,   // 1 byte: 0/1
    GainP = 0x14,          // 2 bytes, gain * 1000
    GainI = 0x16,          // 2 bytes, gain * 1000
    GainD = 0x18,          // 2 bytes, gain * 1000

    // Targets
    GoalPosition = 0x20, // 4 bytes, signed counts
    GoalVelocity = 0x24, // 4 bytes, signed counts/s
    DutyCycle = 0x28,    // 2 bytes, signed per-mille

    // Feedback (read-only)
    PresentPosition = 0x30, // 4 bytes, signed counts
    ClosedLoopError = 0x34, // 4 bytes, signed counts
    OutputCurrent = 0x38,   // 2 bytes, milliamps
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response from controller {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("checksum mismatch from controller {id}")]
    ChecksumMismatch { id: u8 },

    #[error("controller {id} fault status: 0x{status:02X}")]
    ControllerFault { id: u8, status: u8 },

    #[error("timeout waiting for controller {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Shared serial bus to every motor controller on the robot.
pub struct MotorBus {
    port: Box<dyn SerialPort>,
}

impl MotorBus {
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;
        Ok(Self { port })
    }

    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8;
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);
        let body = &packet[2..];
        packet.push(Self::checksum(body));

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BusError::Timeout { id: expected_id }
            } else {
                BusError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("bad header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("id mismatch: expected {}, got {}", expected_id, id),
            });
        }

        // status + params + checksum
        let mut remaining = vec![0u8; length];
        self.port.read_exact(&mut remaining)?;
        Self::parse_body(id, &remaining)
    }

    /// Validate a response body (status + params + checksum) and strip it
    /// down to the params. A corrupt length byte shows up here as a body
    /// too short to hold even status and checksum.
    fn parse_body(id: u8, body: &[u8]) -> Result<Vec<u8>> {
        if body.len() < 2 {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("bad length {}", body.len()),
            });
        }

        let mut checksum_data = vec![id, body.len() as u8];
        checksum_data.extend_from_slice(&body[..body.len() - 1]);
        if Self::checksum(&checksum_data) != body[body.len() - 1] {
            return Err(BusError::ChecksumMismatch { id });
        }

        let status = body[0];
        if status != 0 {
            return Err(BusError::ControllerFault { id, status });
        }

        Ok(body[1..body.len() - 1].to_vec())
    }

    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;
        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(BusError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("write u8 to {}: {:?} = {}", id, register, value);
        self.write_register(id, register, &[value])
    }

    pub fn write_i16(&mut self, id: u8, register: Register, value: i16) -> Result<()> {
        debug!("write i16 to {}: {:?} = {}", id, register, value);
        self.write_register(id, register, &value.to_le_bytes())
    }

    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        debug!("write u16 to {}: {:?} = {}", id, register, value);
        self.write_register(id, register, &value.to_le_bytes())
    }

    pub fn write_i32(&mut self, id: u8, register: Register, value: i32) -> Result<()> {
        debug!("write i32 to {}: {:?} = {}", id, register, value);
        self.write_register(id, register, &value.to_le_bytes())
    }

    fn write_register(&mut self, id: u8, register: Register, bytes: &[u8]) -> Result<()> {
        let mut params = Vec::with_capacity(1 + bytes.len());
        params.push(register as u8);
        params.extend_from_slice(bytes);
        let packet = Self::build_packet(id, Instruction::Write, &params);
        self.send_packet(&packet)?;
        let _ = self.read_response(id)?;
        Ok(())
    }

    fn read_register(&mut self, id: u8, register: Register, len: u8) -> Result<Vec<u8>> {
        let params = [register as u8, len];
        let packet = Self::build_packet(id, Instruction::Read, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() < len as usize {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("expected {} bytes, got {}", len, response.len()),
            });
        }
        Ok(response)
    }

    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let response = self.read_register(id, register, 2)?;
        Ok(u16::from_le_bytes([response[0], response[1]]))
    }

    pub fn read_i32(&mut self, id: u8, register: Register) -> Result<i32> {
        let response = self.read_register(id, register, 4)?;
        Ok(i32::from_le_bytes([
            response[0],
            response[1],
            response[2],
            response[3],
        ]))
    }
}
