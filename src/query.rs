use crate::error::Result;
use crate::registers::{Field, Measurement, Register};
use crate::status::InverterStatus;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const PV_POWER_INPUTS: [Register; 4] = [
    Register::Pv1Voltage,
    Register::Pv1Current,
    Register::Pv2Voltage,
    Register::Pv2Current,
];

/// One poll cycle's worth of decoded values. `None` marks a field that
/// could not be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<Field, Option<f64>>,
}

impl Snapshot {
    /// Build a snapshot from per-register results and fill in derived fields.
    pub fn from_registers(
        timestamp: DateTime<Utc>,
        registers: impl IntoIterator<Item = (Register, Option<f64>)>,
    ) -> Self {
        let mut values: BTreeMap<Field, Option<f64>> = registers
            .into_iter()
            .map(|(register, value)| (Field::Register(register), value))
            .collect();

        let pv_power = pv_power(&values);
        values.insert(Field::PvPower, pv_power);

        Self { timestamp, values }
    }

    pub fn get(&self, field: impl Into<Field>) -> Option<f64> {
        self.values.get(&field.into()).copied().flatten()
    }

    pub fn is_available(&self, field: impl Into<Field>) -> bool {
        self.get(field).is_some()
    }

    pub fn measurement(&self, field: impl Into<Field>) -> Option<Measurement> {
        let field = field.into();
        self.get(field).map(|value| Measurement::new(field, value))
    }

    pub fn status(&self) -> Option<InverterStatus> {
        self.get(Register::Status)
            .map(|code| InverterStatus::from_code(code as u16))
    }

    pub fn status_label(&self) -> Option<String> {
        self.status().map(|s| s.to_string())
    }

    /// Whether the inverter reports normal operation; `None` when the status
    /// register could not be read.
    pub fn inverter_running(&self) -> Option<bool> {
        self.status().map(|s| s.is_running())
    }

    pub fn available_count(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.values.len() - self.available_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<f64>)> + '_ {
        self.values.iter().map(|(field, value)| (*field, *value))
    }
}

fn pv_power(values: &BTreeMap<Field, Option<f64>>) -> Option<f64> {
    let [v1, i1, v2, i2] =
        PV_POWER_INPUTS.map(|r| values.get(&Field::Register(r)).copied().flatten());
    Some(v1? * i1? + v2? * i2?)
}

pub async fn read_register<T: Transport>(transport: &mut T, register: Register) -> Result<f64> {
    let words = transport
        .read_registers(register.address(), register.quantity(), register.bank())
        .await?;
    register.parse_registers(&words)
}

/// Read every catalog register and derive computed fields.
///
/// A failing register is logged and recorded as unavailable; the cycle
/// always produces a complete snapshot.
pub async fn collect_all<T: Transport>(transport: &mut T) -> Snapshot {
    let mut registers = Vec::with_capacity(Register::ALL.len());

    for register in Register::ALL {
        let value = match read_register(transport, register).await {
            Ok(value) => {
                tracing::trace!("{} = {}", register, value);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", register, e);
                None
            }
        };
        registers.push((register, value));
    }

    let snapshot = Snapshot::from_registers(Utc::now(), registers);
    tracing::debug!(
        "Collected {} fields ({} unavailable)",
        snapshot.values.len(),
        snapshot.unavailable_count()
    );
    snapshot
}
