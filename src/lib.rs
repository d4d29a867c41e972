pub mod collector;
pub mod config;
pub mod curtailment;
pub mod device;
pub mod error;
pub mod inverter;
pub mod query;
pub mod registers;
pub mod status;
pub mod tcp;
pub mod transport;

pub use config::InverterConfig;
pub use curtailment::Curtailment;
pub use device::{CommandOutcome, InverterCommand, PowerLimit};
pub use error::{GrowattError, ModbusException, Result};
pub use inverter::Inverter;
pub use query::{Snapshot, collect_all, read_register};
pub use registers::{Field, Measurement, Register, RegisterBank, RegisterSpec, Unit, lookup};
pub use status::{InverterStatus, status_to_label};
pub use tcp::ModbusTcpTransport;
pub use transport::Transport;
