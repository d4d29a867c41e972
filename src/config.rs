use crate::error::{GrowattError, Result};
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_NAME: &str = "Growatt Inverter";
pub const DEFAULT_PORT: u16 = 502;
pub const DEFAULT_UNIT_ID: u8 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

pub const UNIT_ID_RANGE: RangeInclusive<u8> = 1..=247;
pub const TIMEOUT_RANGE_SECS: RangeInclusive<u64> = 1..=30;

/// Connection parameters for one inverter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverterConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl InverterConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            host: host.into(),
            port: DEFAULT_PORT,
            unit_id: DEFAULT_UNIT_ID,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(GrowattError::InvalidArgument("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(GrowattError::InvalidArgument(
                "port must be between 1 and 65535".into(),
            ));
        }
        if !UNIT_ID_RANGE.contains(&self.unit_id) {
            return Err(GrowattError::InvalidArgument(format!(
                "unit id {} outside {}..={}",
                self.unit_id,
                UNIT_ID_RANGE.start(),
                UNIT_ID_RANGE.end()
            )));
        }
        let timeout_secs = self.timeout.as_secs();
        if self.timeout.subsec_nanos() != 0 || !TIMEOUT_RANGE_SECS.contains(&timeout_secs) {
            return Err(GrowattError::InvalidArgument(format!(
                "timeout {:?} outside {}..={} seconds",
                self.timeout,
                TIMEOUT_RANGE_SECS.start(),
                TIMEOUT_RANGE_SECS.end()
            )));
        }
        if self.poll_interval < Duration::from_secs(1) {
            return Err(GrowattError::InvalidArgument(
                "poll interval must be at least one second".into(),
            ));
        }
        Ok(())
    }

    pub fn socket_label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
