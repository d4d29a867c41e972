//! Modbus TCP transport for Growatt inverters.
//!
//! This module provides a TCP transport that implements the `Transport` trait,
//! using `tokio-modbus` for the underlying Modbus TCP communication. The
//! connection is opened lazily and dropped on any transport failure, so the
//! next call reconnects.

use crate::config::InverterConfig;
use crate::error::{GrowattError, Result};
use crate::registers::RegisterBank;
use crate::transport::Transport;
use std::io::{Error as IoError, ErrorKind};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tokio_modbus::client::{Client, Context, Reader, Writer, tcp};
use tokio_modbus::prelude::Slave;

/// Modbus TCP transport for one inverter endpoint.
///
/// # Example
///
/// ```ignore
/// use growatt_rs::{ModbusTcpTransport, RegisterBank, Transport};
///
/// let mut transport = ModbusTcpTransport::new("192.168.1.50", 502, 1, Duration::from_secs(5));
/// let words = transport.read_registers(0, 1, RegisterBank::Input).await?;
/// ```
pub struct ModbusTcpTransport {
    host: String,
    port: u16,
    unit_id: u8,
    timeout: Duration,
    ctx: Option<Context>,
}

impl std::fmt::Debug for ModbusTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("unit_id", &self.unit_id)
            .field("connected", &self.ctx.is_some())
            .finish_non_exhaustive()
    }
}

impl ModbusTcpTransport {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            timeout,
            ctx: None,
        }
    }

    pub fn from_config(config: &InverterConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            config.unit_id,
            config.timeout,
        )
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn context(&mut self) -> Result<&mut Context> {
        self.ctx.as_mut().ok_or_else(|| {
            GrowattError::Connection(IoError::new(ErrorKind::NotConnected, "not connected"))
        })
    }

    /// Sort the three ways a request can end. Anything other than a value or
    /// an exception response leaves the session in an unknown state.
    fn settle<T>(
        &mut self,
        address: u16,
        outcome: std::result::Result<tokio_modbus::Result<T>, Elapsed>,
    ) -> Result<T> {
        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(exception))) => Err(GrowattError::Protocol {
                address,
                exception: exception.into(),
            }),
            Ok(Err(e)) => {
                tracing::debug!("Dropping connection to {}:{}: {}", self.host, self.port, e);
                self.ctx = None;
                Err(modbus_to_growatt_error(e))
            }
            Err(_) => {
                tracing::debug!(
                    "Request to {}:{} timed out, dropping connection",
                    self.host,
                    self.port
                );
                self.ctx = None;
                Err(GrowattError::Timeout(self.timeout))
            }
        }
    }
}

impl Transport for ModbusTcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.ctx.is_some() {
            return Ok(());
        }

        tracing::debug!(
            "Connecting to {}:{} (unit {})",
            self.host,
            self.port,
            self.unit_id
        );
        let stream = timeout(
            self.timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| GrowattError::Timeout(self.timeout))??;
        stream.set_nodelay(true).ok();

        self.ctx = Some(tcp::attach_slave(stream, Slave(self.unit_id)));
        tracing::info!("Connected to {}:{}", self.host, self.port);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::debug!("Disconnect from {}:{} failed: {}", self.host, self.port, e);
            }
            tracing::info!("Closed connection to {}:{}", self.host, self.port);
        }
    }

    fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
        bank: RegisterBank,
    ) -> Result<Vec<u16>> {
        self.connect().await?;

        let limit = self.timeout;
        let ctx = self.context()?;
        tracing::trace!("Reading {} {} register(s) at {}", count, bank, address);
        let outcome = match bank {
            RegisterBank::Input => timeout(limit, ctx.read_input_registers(address, count)).await,
            RegisterBank::Holding => {
                timeout(limit, ctx.read_holding_registers(address, count)).await
            }
        };
        self.settle(address, outcome)
    }

    async fn write_register(&mut self, address: u16, value: u16, bank: RegisterBank) -> Result<()> {
        if bank != RegisterBank::Holding {
            return Err(GrowattError::InvalidOperation(format!(
                "cannot write register {address}: {bank} registers are read-only"
            )));
        }

        self.connect().await?;

        let limit = self.timeout;
        let ctx = self.context()?;
        tracing::debug!("Writing {} to holding register {}", value, address);
        let outcome = timeout(limit, ctx.write_single_register(address, value)).await;
        self.settle(address, outcome)
    }
}

fn modbus_to_growatt_error(e: tokio_modbus::Error) -> GrowattError {
    match e {
        tokio_modbus::Error::Transport(io) => GrowattError::Connection(io),
        other => GrowattError::Connection(IoError::new(ErrorKind::InvalidData, other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn input_bank_write_sends_nothing() {
        // Port 9 on an unroutable address: any connect attempt would hang or fail.
        let mut transport = ModbusTcpTransport::new("192.0.2.1", 9, 1, Duration::from_secs(1));
        let err = transport
            .write_register(3, 40, RegisterBank::Input)
            .await
            .unwrap_err();
        assert!(matches!(err, GrowattError::InvalidOperation(_)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn close_when_closed_is_noop() {
        let mut transport = ModbusTcpTransport::new("127.0.0.1", 502, 1, Duration::from_secs(1));
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_connected());
    }

    #[test]
    fn debug_hides_context() {
        let transport = ModbusTcpTransport::new("10.0.0.2", 502, 3, Duration::from_secs(5));
        let text = format!("{:?}", transport);
        assert!(text.contains("10.0.0.2"));
        assert!(text.contains("connected: false"));
    }
}
