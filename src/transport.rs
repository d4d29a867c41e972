use crate::error::Result;
use crate::registers::RegisterBank;
use std::future::Future;

/// Transport trait for register access to a single inverter.
///
/// Implementations own the connection handle. None of the methods may be
/// called concurrently on one instance; callers serialise access.
pub trait Transport {
    /// Open the connection unless it is already open.
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Release the connection. Closing an already closed transport is a no-op.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    fn is_connected(&self) -> bool;

    /// Read `count` consecutive registers starting at `address` in one transaction.
    fn read_registers(
        &mut self,
        address: u16,
        count: u16,
        bank: RegisterBank,
    ) -> impl Future<Output = Result<Vec<u16>>> + Send;

    /// Write a single holding register. Writes to the input bank are rejected
    /// before any traffic is sent.
    fn write_register(
        &mut self,
        address: u16,
        value: u16,
        bank: RegisterBank,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::Transport;
    use crate::error::{GrowattError, ModbusException, Result};
    use crate::registers::RegisterBank;
    use std::collections::{HashMap, HashSet};

    /// In-memory transport that serves scripted register words.
    #[derive(Debug, Default)]
    pub struct FakeTransport {
        pub registers: HashMap<(RegisterBank, u16), u16>,
        pub broken_reads: HashSet<(RegisterBank, u16)>,
        pub exception_writes: HashSet<u16>,
        pub unreachable: bool,
        pub connected: bool,
        pub connect_calls: usize,
        pub reads: Vec<(u16, u16, RegisterBank)>,
        pub writes: Vec<(u16, u16, RegisterBank)>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, bank: RegisterBank, address: u16, words: &[u16]) -> Self {
            for (i, word) in words.iter().enumerate() {
                self.registers.insert((bank, address + i as u16), *word);
            }
            self
        }

        /// Reads touching this register fail as if the socket dropped mid-call.
        pub fn break_read(mut self, bank: RegisterBank, address: u16) -> Self {
            self.broken_reads.insert((bank, address));
            self
        }

        /// Writes to this address get an exception response.
        pub fn reject_write(mut self, address: u16) -> Self {
            self.exception_writes.insert(address);
            self
        }

        fn ensure_connected(&mut self) -> Result<()> {
            if self.connected {
                return Ok(());
            }
            self.connect_calls += 1;
            if self.unreachable {
                return Err(GrowattError::Connection(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            self.connected = true;
            Ok(())
        }
    }

    impl Transport for FakeTransport {
        async fn connect(&mut self) -> Result<()> {
            self.ensure_connected()
        }

        async fn close(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn read_registers(
            &mut self,
            address: u16,
            count: u16,
            bank: RegisterBank,
        ) -> Result<Vec<u16>> {
            self.ensure_connected()?;
            self.reads.push((address, count, bank));

            let span = address..address + count;
            if span.clone().any(|a| self.broken_reads.contains(&(bank, a))) {
                self.connected = false;
                return Err(GrowattError::Connection(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "broken pipe",
                )));
            }

            span.map(|a| {
                self.registers
                    .get(&(bank, a))
                    .copied()
                    .ok_or(GrowattError::Protocol {
                        address,
                        exception: ModbusException::IllegalDataAddress,
                    })
            })
            .collect()
        }

        async fn write_register(
            &mut self,
            address: u16,
            value: u16,
            bank: RegisterBank,
        ) -> Result<()> {
            if bank != RegisterBank::Holding {
                return Err(GrowattError::InvalidOperation(format!(
                    "register {address} is in the {bank} bank"
                )));
            }
            self.ensure_connected()?;
            self.writes.push((address, value, bank));
            if self.exception_writes.contains(&address) {
                return Err(GrowattError::Protocol {
                    address,
                    exception: ModbusException::IllegalDataValue,
                });
            }
            self.registers.insert((bank, address), value);
            Ok(())
        }
    }
}
