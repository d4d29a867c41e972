//! Minimal Modbus TCP inverter for integration tests.
//!
//! Serves functions 03, 04 and 06 from in-memory register maps and answers
//! with exception responses for unknown addresses or rejected writes.

#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const ILLEGAL_FUNCTION: u8 = 0x01;
const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
const ILLEGAL_DATA_VALUE: u8 = 0x03;

#[derive(Debug, Default)]
pub struct DeviceState {
    pub input: HashMap<u16, u16>,
    pub holding: HashMap<u16, u16>,
    pub rejected_writes: HashSet<u16>,
    pub writes: Vec<(u16, u16)>,
    pub connections: usize,
    /// Read requests but never answer them.
    pub silent: bool,
    generation: u64,
}

impl DeviceState {
    pub fn input(mut self, address: u16, words: &[u16]) -> Self {
        for (i, word) in words.iter().enumerate() {
            self.input.insert(address + i as u16, *word);
        }
        self
    }

    pub fn holding(mut self, address: u16, words: &[u16]) -> Self {
        for (i, word) in words.iter().enumerate() {
            self.holding.insert(address + i as u16, *word);
        }
        self
    }

    /// Register image of an inverter producing about 3 kW from two strings.
    pub fn healthy() -> Self {
        Self::default()
            .input(0, &[1])
            .input(3, &[3005, 52])
            .input(7, &[2980, 48])
            .input(36, &[28500, 5002, 2301, 124])
            .input(53, &[0x0001, 0x2345])
            .input(91, &[0x0000, 0x3039, 412])
            .holding(0, &[1, 0, 0, 100])
    }
}

pub struct FakeInverter {
    pub addr: SocketAddr,
    state: Arc<Mutex<DeviceState>>,
    task: JoinHandle<()>,
}

impl FakeInverter {
    pub async fn start(state: DeviceState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(state));

        let shared = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let generation = {
                    let mut s = shared.lock().unwrap();
                    s.connections += 1;
                    s.generation
                };
                tokio::spawn(serve(stream, shared.clone(), generation));
            }
        });

        Self { addr, state, task }
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    /// Drop every open connection the next time it sends a request.
    pub fn hang_up(&self) {
        self.state().generation += 1;
    }
}

impl Drop for FakeInverter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A local port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<DeviceState>>, generation: u64) {
    let mut header = [0u8; 7];
    while stream.read_exact(&mut header).await.is_ok() {
        let length = BigEndian::read_u16(&header[4..6]) as usize;
        let mut pdu = vec![0u8; length.saturating_sub(1)];
        if stream.read_exact(&mut pdu).await.is_err() {
            return;
        }

        let reply = {
            let mut s = state.lock().unwrap();
            if s.generation != generation {
                return;
            }
            if s.silent {
                None
            } else {
                Some(respond(&mut s, &pdu))
            }
        };
        let Some(reply) = reply else {
            continue;
        };

        // Echo transaction id, protocol id and unit id.
        let mut frame = Vec::with_capacity(7 + reply.len());
        frame.extend_from_slice(&header[0..4]);
        WriteBytesExt::write_u16::<BigEndian>(&mut frame, reply.len() as u16 + 1).unwrap();
        frame.push(header[6]);
        frame.extend_from_slice(&reply);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn respond(state: &mut DeviceState, pdu: &[u8]) -> Vec<u8> {
    if pdu.len() < 5 {
        return vec![pdu.first().copied().unwrap_or(0) | 0x80, ILLEGAL_FUNCTION];
    }
    let function = pdu[0];
    let address = BigEndian::read_u16(&pdu[1..3]);
    let operand = BigEndian::read_u16(&pdu[3..5]);

    match function {
        0x03 | 0x04 => {
            let bank = if function == 0x03 {
                &state.holding
            } else {
                &state.input
            };
            let words: Option<Vec<u16>> = (address..address + operand)
                .map(|a| bank.get(&a).copied())
                .collect();
            match words {
                Some(words) => {
                    let mut reply = vec![function, (words.len() * 2) as u8];
                    for word in words {
                        WriteBytesExt::write_u16::<BigEndian>(&mut reply, word).unwrap();
                    }
                    reply
                }
                None => vec![function | 0x80, ILLEGAL_DATA_ADDRESS],
            }
        }
        0x06 => {
            state.writes.push((address, operand));
            if state.rejected_writes.contains(&address) {
                return vec![function | 0x80, ILLEGAL_DATA_VALUE];
            }
            state.holding.insert(address, operand);
            pdu[..5].to_vec()
        }
        _ => vec![function | 0x80, ILLEGAL_FUNCTION],
    }
}
