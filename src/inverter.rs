use crate::config::InverterConfig;
use crate::device::{self, CommandOutcome, InverterCommand};
use crate::error::Result;
use crate::query::{self, Snapshot};
use crate::registers::{Register, RegisterBank};
use crate::status::{InverterStatus, status_to_label};
use crate::tcp::ModbusTcpTransport;
use crate::transport::Transport;

/// One inverter and the transport that reaches it.
///
/// Every method takes `&mut self`: polling and commands share the single
/// connection and must not run concurrently.
#[derive(Debug)]
pub struct Inverter<T: Transport> {
    name: String,
    transport: T,
}

impl Inverter<ModbusTcpTransport> {
    pub fn from_config(config: &InverterConfig) -> Self {
        Self::new(config.name.clone(), ModbusTcpTransport::from_config(config))
    }
}

impl<T: Transport> Inverter<T> {
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    pub async fn close(&mut self) {
        self.transport.close().await
    }

    pub async fn read_register(
        &mut self,
        address: u16,
        count: u16,
        bank: RegisterBank,
    ) -> Result<Vec<u16>> {
        self.transport.read_registers(address, count, bank).await
    }

    pub async fn write_register(
        &mut self,
        address: u16,
        value: u16,
        bank: RegisterBank,
    ) -> Result<()> {
        self.transport.write_register(address, value, bank).await
    }

    pub async fn read_field(&mut self, register: Register) -> Result<f64> {
        query::read_register(&mut self.transport, register).await
    }

    pub async fn collect_all(&mut self) -> Snapshot {
        query::collect_all(&mut self.transport).await
    }

    pub async fn execute(&mut self, command: InverterCommand) -> Result<CommandOutcome> {
        device::execute(&mut self.transport, command).await
    }

    pub async fn set_power_limit(&mut self, percent: i64) -> Result<CommandOutcome> {
        device::set_power_limit(&mut self.transport, percent).await
    }

    pub async fn set_inverter_enable(&mut self, enabled: bool) -> Result<CommandOutcome> {
        device::set_inverter_enable(&mut self.transport, enabled).await
    }

    pub fn status_to_label(code: u16) -> String {
        status_to_label(code)
    }

    /// Read the status register once and hang up again.
    pub async fn test_connection(&mut self) -> Result<InverterStatus> {
        let result = self.read_field(Register::Status).await;
        self.close().await;
        result.map(|code| InverterStatus::from_code(code as u16))
    }
}
