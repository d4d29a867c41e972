use crate::error::{GrowattError, ModbusException, Result};
use crate::registers::Register;
use crate::transport::Transport;
use std::fmt;

// Control values
const CMD_MEMORY_ENABLE_VALUE: u16 = 1;
const INVERTER_ON_VALUE: u16 = 1;
const INVERTER_OFF_VALUE: u16 = 0;

/// Active power limit as a percentage of rated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PowerLimit(u8);

impl PowerLimit {
    const MAX_PERCENT: i64 = 100;

    pub const FULL: PowerLimit = PowerLimit(100);

    /// Create a power limit with validation
    pub fn new(percent: i64) -> Result<Self> {
        if !Self::is_valid_percent(percent) {
            return Err(GrowattError::InvalidArgument(format!(
                "power limit must be between 0 and 100, got {percent}"
            )));
        }
        Ok(Self(percent as u8))
    }

    pub const fn is_valid_percent(percent: i64) -> bool {
        percent >= 0 && percent <= Self::MAX_PERCENT
    }

    pub const fn percent(&self) -> u8 {
        self.0
    }
}

impl Default for PowerLimit {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for PowerLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Inverter control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverterCommand {
    /// Enable command memory, then write the limit
    SetPowerLimit(PowerLimit),
    /// Start or stop power production
    SetEnable(bool),
}

impl InverterCommand {
    /// Holding-register writes for this command, in the order they must be issued.
    pub fn writes(&self) -> Vec<(Register, u16)> {
        match self {
            InverterCommand::SetPowerLimit(limit) => vec![
                (Register::CmdMemory, CMD_MEMORY_ENABLE_VALUE),
                (Register::PowerLimit, limit.percent() as u16),
            ],
            InverterCommand::SetEnable(true) => vec![(Register::InverterEnable, INVERTER_ON_VALUE)],
            InverterCommand::SetEnable(false) => {
                vec![(Register::InverterEnable, INVERTER_OFF_VALUE)]
            }
        }
    }
}

impl fmt::Display for InverterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InverterCommand::SetPowerLimit(limit) => write!(f, "set power limit to {}", limit),
            InverterCommand::SetEnable(true) => write!(f, "enable inverter"),
            InverterCommand::SetEnable(false) => write!(f, "disable inverter"),
        }
    }
}

/// Result of a command that reached the inverter.
#[must_use = "the inverter state changed; schedule a refresh"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: InverterCommand,
    pub writes: usize,
    /// A preparatory write the inverter refused while the command itself landed.
    pub refused: Option<(Register, ModbusException)>,
}

impl CommandOutcome {
    /// Every executed command changes device state, so the last snapshot is stale.
    pub const fn needs_refresh(&self) -> bool {
        self.writes > 0
    }

    pub const fn is_clean(&self) -> bool {
        self.refused.is_none()
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.refused {
            None => write!(f, "{}", self.command),
            Some((register, exception)) => {
                write!(f, "{} ({} refused: {})", self.command, register, exception)
            }
        }
    }
}

/// Execute a command's writes in order.
///
/// The command-memory write of a power limit must finish before the limit
/// itself is written. If it is refused by the device the limit write still
/// goes out and the refusal is recorded in the outcome; if the link is down
/// the sequence stops there.
pub async fn execute<T: Transport>(
    transport: &mut T,
    command: InverterCommand,
) -> Result<CommandOutcome> {
    tracing::info!("Executing: {}", command);

    let mut refused = None;
    let mut writes = 0;

    for (register, value) in command.writes() {
        let result = transport
            .write_register(register.address(), value, register.bank())
            .await;
        writes += 1;

        match result {
            Ok(()) => tracing::debug!("{} <- {}", register, value),
            Err(GrowattError::Protocol { exception, .. }) if register == Register::CmdMemory => {
                tracing::warn!("Inverter refused {} <- {}: {}", register, value, exception);
                refused = Some((register, exception));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(CommandOutcome {
        command,
        writes,
        refused,
    })
}

pub async fn set_power_limit<T: Transport>(
    transport: &mut T,
    percent: i64,
) -> Result<CommandOutcome> {
    let limit = PowerLimit::new(percent)?;
    execute(transport, InverterCommand::SetPowerLimit(limit)).await
}

pub async fn set_inverter_enable<T: Transport>(
    transport: &mut T,
    enabled: bool,
) -> Result<CommandOutcome> {
    execute(transport, InverterCommand::SetEnable(enabled)).await
}
