use crate::error::{GrowattError, Result};
use crate::status::InverterStatus;
use byteorder::{BigEndian, ByteOrder};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uom::si::electric_current::ampere;
use uom::si::electric_potential::volt;
use uom::si::energy::kilowatt_hour;
use uom::si::f64::{
    ElectricCurrent, ElectricPotential, Energy, Frequency, Power, ThermodynamicTemperature,
};
use uom::si::frequency::hertz;
use uom::si::power::watt;
use uom::si::thermodynamic_temperature::degree_celsius;

/// Modbus register bank. Input registers are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterBank {
    Input,
    Holding,
}

impl fmt::Display for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterBank::Input => write!(f, "input"),
            RegisterBank::Holding => write!(f, "holding"),
        }
    }
}

impl FromStr for RegisterBank {
    type Err = GrowattError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "input" => Ok(RegisterBank::Input),
            "holding" => Ok(RegisterBank::Holding),
            other => Err(GrowattError::InvalidArgument(format!(
                "unknown register bank '{other}' (expected input or holding)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    /// One unsigned 16-bit register.
    U16,
    /// Two registers, high word first.
    U32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Volt,
    Ampere,
    Watt,
    Hertz,
    KilowattHour,
    Celsius,
    Percent,
    None,
}

impl Unit {
    pub const fn symbol(&self) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Watt => "W",
            Unit::Hertz => "Hz",
            Unit::KilowattHour => "kWh",
            Unit::Celsius => "°C",
            Unit::Percent => "%",
            Unit::None => "",
        }
    }
}

/// Plain-data view of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterSpec {
    pub address: u16,
    pub bank: RegisterBank,
    pub word_count: u16,
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    Status,
    // Control
    InverterEnable,
    CmdMemory,
    PowerLimit,
    // PV strings
    Pv1Voltage,
    Pv1Current,
    Pv2Voltage,
    Pv2Current,
    // AC output
    AcPower,
    AcFrequency,
    AcVoltage,
    AcCurrent,
    // Energy
    TodayEnergy,
    TotalEnergy,
    Temperature,
}

impl Register {
    pub const ALL: [Register; 15] = [
        Register::Status,
        Register::InverterEnable,
        Register::CmdMemory,
        Register::PowerLimit,
        Register::Pv1Voltage,
        Register::Pv1Current,
        Register::Pv2Voltage,
        Register::Pv2Current,
        Register::AcPower,
        Register::AcFrequency,
        Register::AcVoltage,
        Register::AcCurrent,
        Register::TodayEnergy,
        Register::TotalEnergy,
        Register::Temperature,
    ];

    pub const fn address(&self) -> u16 {
        match self {
            Register::Status => 0,
            Register::InverterEnable => 0,
            Register::CmdMemory => 2,
            Register::PowerLimit => 3,
            Register::Pv1Voltage => 3,
            Register::Pv1Current => 4,
            Register::Pv2Voltage => 7,
            Register::Pv2Current => 8,
            Register::AcPower => 36,
            Register::AcFrequency => 37,
            Register::AcVoltage => 38,
            Register::AcCurrent => 39,
            Register::TodayEnergy => 53,
            Register::TotalEnergy => 91,
            Register::Temperature => 93,
        }
    }

    pub const fn bank(&self) -> RegisterBank {
        match self {
            Register::InverterEnable | Register::CmdMemory | Register::PowerLimit => {
                RegisterBank::Holding
            }
            _ => RegisterBank::Input,
        }
    }

    pub const fn decode_kind(&self) -> DecodeKind {
        match self {
            Register::TodayEnergy | Register::TotalEnergy => DecodeKind::U32,
            _ => DecodeKind::U16,
        }
    }

    pub const fn quantity(&self) -> u16 {
        match self.decode_kind() {
            DecodeKind::U16 => 1,
            DecodeKind::U32 => 2,
        }
    }

    pub const fn scale(&self) -> Option<f64> {
        match self {
            Register::Pv1Voltage
            | Register::Pv1Current
            | Register::Pv2Voltage
            | Register::Pv2Current
            | Register::AcPower
            | Register::AcVoltage
            | Register::AcCurrent
            | Register::TodayEnergy
            | Register::TotalEnergy
            | Register::Temperature => Some(0.1),
            Register::AcFrequency => Some(0.01),
            Register::Status
            | Register::InverterEnable
            | Register::CmdMemory
            | Register::PowerLimit => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Register::Status => "status",
            Register::InverterEnable => "inverter_enable",
            Register::CmdMemory => "cmd_memory",
            Register::PowerLimit => "power_limit",
            Register::Pv1Voltage => "pv1_voltage",
            Register::Pv1Current => "pv1_current",
            Register::Pv2Voltage => "pv2_voltage",
            Register::Pv2Current => "pv2_current",
            Register::AcPower => "ac_power",
            Register::AcFrequency => "ac_frequency",
            Register::AcVoltage => "ac_voltage",
            Register::AcCurrent => "ac_current",
            Register::TodayEnergy => "today_energy",
            Register::TotalEnergy => "total_energy",
            Register::Temperature => "temperature",
        }
    }

    pub const fn unit(&self) -> Unit {
        match self {
            Register::Pv1Voltage | Register::Pv2Voltage | Register::AcVoltage => Unit::Volt,
            Register::Pv1Current | Register::Pv2Current | Register::AcCurrent => Unit::Ampere,
            Register::AcPower => Unit::Watt,
            Register::AcFrequency => Unit::Hertz,
            Register::TodayEnergy | Register::TotalEnergy => Unit::KilowattHour,
            Register::Temperature => Unit::Celsius,
            Register::PowerLimit => Unit::Percent,
            Register::Status | Register::InverterEnable | Register::CmdMemory => Unit::None,
        }
    }

    pub const fn spec(&self) -> RegisterSpec {
        RegisterSpec {
            address: self.address(),
            bank: self.bank(),
            word_count: self.quantity(),
            scale: self.scale(),
        }
    }

    /// Reassemble the unscaled integer from the words returned by one read.
    pub fn parse_raw(&self, words: &[u16]) -> Result<u32> {
        let expected = self.quantity();
        if words.len() != expected as usize {
            return Err(GrowattError::InvalidResponse {
                expected,
                actual: words.len(),
            });
        }

        let data: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        Ok(match self.decode_kind() {
            DecodeKind::U16 => BigEndian::read_u16(&data) as u32,
            DecodeKind::U32 => BigEndian::read_u32(&data),
        })
    }

    pub fn parse_registers(&self, words: &[u16]) -> Result<f64> {
        let raw = self.parse_raw(words)? as f64;
        Ok(match self.scale() {
            Some(scale) => raw * scale,
            None => raw,
        })
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = GrowattError;

    fn from_str(s: &str) -> Result<Self> {
        Register::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| GrowattError::NotFound(s.to_string()))
    }
}

/// Look up a catalog entry by its field name.
pub fn lookup(name: &str) -> Result<RegisterSpec> {
    name.parse::<Register>().map(|r| r.spec())
}

/// Snapshot key: a catalog register or a value derived from several of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Register(Register),
    PvPower,
}

impl Field {
    pub const DERIVED: [Field; 1] = [Field::PvPower];

    pub fn all() -> impl Iterator<Item = Field> {
        Register::ALL
            .into_iter()
            .map(Field::Register)
            .chain(Field::DERIVED)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Field::Register(r) => r.name(),
            Field::PvPower => "pv_power",
        }
    }

    pub const fn unit(&self) -> Unit {
        match self {
            Field::Register(r) => r.unit(),
            Field::PvPower => Unit::Watt,
        }
    }

    pub const fn is_derived(&self) -> bool {
        matches!(self, Field::PvPower)
    }
}

impl From<Register> for Field {
    fn from(register: Register) -> Self {
        Field::Register(register)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = GrowattError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pv_power" => Ok(Field::PvPower),
            other => other.parse::<Register>().map(Field::Register),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A field value tagged with its physical quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    ElectricPotential(ElectricPotential),
    ElectricCurrent(ElectricCurrent),
    Power(Power),
    Frequency(Frequency),
    Energy(Energy),
    ThermodynamicTemperature(ThermodynamicTemperature),
    Percent(f64),
    Status(InverterStatus),
    Integer(u32),
}

impl Measurement {
    pub fn new(field: Field, value: f64) -> Self {
        match field.unit() {
            Unit::Volt => Measurement::ElectricPotential(ElectricPotential::new::<volt>(value)),
            Unit::Ampere => Measurement::ElectricCurrent(ElectricCurrent::new::<ampere>(value)),
            Unit::Watt => Measurement::Power(Power::new::<watt>(value)),
            Unit::Hertz => Measurement::Frequency(Frequency::new::<hertz>(value)),
            Unit::KilowattHour => Measurement::Energy(Energy::new::<kilowatt_hour>(value)),
            Unit::Celsius => Measurement::ThermodynamicTemperature(
                ThermodynamicTemperature::new::<degree_celsius>(value),
            ),
            Unit::Percent => Measurement::Percent(value),
            Unit::None if field == Field::Register(Register::Status) => {
                Measurement::Status(InverterStatus::from_code(value as u16))
            }
            Unit::None => Measurement::Integer(value as u32),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::ElectricPotential(v) => write!(f, "{:.1} V", v.get::<volt>()),
            Measurement::ElectricCurrent(c) => write!(f, "{:.1} A", c.get::<ampere>()),
            Measurement::Power(p) => write!(f, "{:.1} W", p.get::<watt>()),
            Measurement::Frequency(hz) => write!(f, "{:.2} Hz", hz.get::<hertz>()),
            Measurement::Energy(e) => write!(f, "{:.1} kWh", e.get::<kilowatt_hour>()),
            Measurement::ThermodynamicTemperature(t) => {
                write!(f, "{:.1} °C", t.get::<degree_celsius>())
            }
            Measurement::Percent(p) => write!(f, "{} %", p),
            Measurement::Status(s) => write!(f, "{}", s),
            Measurement::Integer(n) => write!(f, "{}", n),
        }
    }
}
