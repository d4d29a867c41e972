use std::fmt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GrowattError {
    #[error("Connection error: {0}")]
    Connection(#[source] std::io::Error),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Modbus exception at register {address}: {exception}")]
    Protocol {
        address: u16,
        exception: ModbusException,
    },
    #[error("Invalid response: expected {expected} registers, got {actual}")]
    InvalidResponse { expected: u16, actual: usize },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Unknown field: {0}")]
    NotFound(String),
}

impl GrowattError {
    /// The transport is down; the connection handle has been dropped.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, GrowattError::Connection(_) | GrowattError::Timeout(_))
    }

    /// The device answered, but not with what was asked for.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            GrowattError::Protocol { .. } | GrowattError::InvalidResponse { .. }
        )
    }
}

impl From<std::io::Error> for GrowattError {
    fn from(err: std::io::Error) -> GrowattError {
        GrowattError::Connection(err)
    }
}

/// Exception code returned by the inverter in place of a normal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusException {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetDeviceFailedToRespond,
    Other(u8),
}

impl ModbusException {
    pub const fn from_u8(code: u8) -> Self {
        match code {
            0x01 => ModbusException::IllegalFunction,
            0x02 => ModbusException::IllegalDataAddress,
            0x03 => ModbusException::IllegalDataValue,
            0x04 => ModbusException::ServerDeviceFailure,
            0x05 => ModbusException::Acknowledge,
            0x06 => ModbusException::ServerDeviceBusy,
            0x08 => ModbusException::MemoryParityError,
            0x0A => ModbusException::GatewayPathUnavailable,
            0x0B => ModbusException::GatewayTargetDeviceFailedToRespond,
            other => ModbusException::Other(other),
        }
    }

    pub const fn code(&self) -> u8 {
        match self {
            ModbusException::IllegalFunction => 0x01,
            ModbusException::IllegalDataAddress => 0x02,
            ModbusException::IllegalDataValue => 0x03,
            ModbusException::ServerDeviceFailure => 0x04,
            ModbusException::Acknowledge => 0x05,
            ModbusException::ServerDeviceBusy => 0x06,
            ModbusException::MemoryParityError => 0x08,
            ModbusException::GatewayPathUnavailable => 0x0A,
            ModbusException::GatewayTargetDeviceFailedToRespond => 0x0B,
            ModbusException::Other(code) => *code,
        }
    }
}

impl From<tokio_modbus::ExceptionCode> for ModbusException {
    fn from(code: tokio_modbus::ExceptionCode) -> Self {
        ModbusException::from_u8(u8::from(code))
    }
}

impl fmt::Display for ModbusException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModbusException::IllegalFunction => write!(f, "Illegal function (01h)"),
            ModbusException::IllegalDataAddress => write!(f, "Illegal data address (02h)"),
            ModbusException::IllegalDataValue => write!(f, "Illegal data value (03h)"),
            ModbusException::ServerDeviceFailure => write!(f, "Server device failure (04h)"),
            ModbusException::Acknowledge => write!(f, "Acknowledge (05h)"),
            ModbusException::ServerDeviceBusy => write!(f, "Server device busy (06h)"),
            ModbusException::MemoryParityError => write!(f, "Memory parity error (08h)"),
            ModbusException::GatewayPathUnavailable => {
                write!(f, "Gateway path unavailable (0Ah)")
            }
            ModbusException::GatewayTargetDeviceFailedToRespond => {
                write!(f, "Gateway target device failed to respond (0Bh)")
            }
            ModbusException::Other(code) => write!(f, "Unknown exception ({:02X}h)", code),
        }
    }
}

pub type Result<T> = std::result::Result<T, GrowattError>;
