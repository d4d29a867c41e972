use std::fmt;

/// Operating state reported in input register 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InverterStatus {
    Standby,
    Normal,
    Fault,
    Unknown(u16),
}

impl InverterStatus {
    pub const fn from_code(code: u16) -> Self {
        match code {
            0 => InverterStatus::Standby,
            1 => InverterStatus::Normal,
            3 => InverterStatus::Fault,
            other => InverterStatus::Unknown(other),
        }
    }

    pub const fn code(&self) -> u16 {
        match self {
            InverterStatus::Standby => 0,
            InverterStatus::Normal => 1,
            InverterStatus::Fault => 3,
            InverterStatus::Unknown(code) => *code,
        }
    }

    pub const fn is_running(&self) -> bool {
        matches!(self, InverterStatus::Normal)
    }
}

impl fmt::Display for InverterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InverterStatus::Standby => write!(f, "Standby"),
            InverterStatus::Normal => write!(f, "Normal"),
            InverterStatus::Fault => write!(f, "Fault"),
            InverterStatus::Unknown(code) => write!(f, "Unknown({})", code),
        }
    }
}

pub fn status_to_label(code: u16) -> String {
    InverterStatus::from_code(code).to_string()
}
