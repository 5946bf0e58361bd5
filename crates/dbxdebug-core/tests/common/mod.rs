//! In-process fake of the DOSBox-X GDB stub for end-to-end tests
//!
//! The stub accepts one connection on an ephemeral port and serves `m`, `M`,
//! `g`, `G`, `Z`, `z`, `s` and `c` from an in-memory target. Every request
//! payload it receives is recorded, retransmissions included.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dbxdebug_core::types::{RegisterSet, SegmentWidth};
use dbxdebug_core::ClientConfig;
use dbxdebug_protocol::{hex, packet};

/// Reads and writes at or above this address fail with `E01`.
pub const MEMORY_LIMIT: u64 = 0x11_0000;

#[derive(Debug, Clone)]
pub struct StubOptions
{
    /// Answer the first request with `-` instead of a reply.
    pub nak_first: bool,
    /// Answer `Z`/`z` with an empty packet when false.
    pub breakpoints_supported: bool,
    /// Reply to `s`.
    pub stop_reply: String,
    /// Acknowledge `c` but never send a stop reply.
    pub continue_hangs: bool,
    /// Close the connection instead of answering request number N (1-based).
    pub hang_up_at: Option<usize>,
    pub segment_width: SegmentWidth,
}

impl Default for StubOptions
{
    fn default() -> Self
    {
        Self {
            nak_first: false,
            breakpoints_supported: true,
            stop_reply: "S05".to_string(),
            continue_hangs: false,
            hang_up_at: None,
            segment_width: SegmentWidth::Bits16,
        }
    }
}

#[derive(Debug, Default)]
pub struct StubState
{
    pub memory: HashMap<u64, u8>,
    pub registers: RegisterSet,
    pub breakpoints: HashSet<(u8, u64)>,
    pub packets: Vec<String>,
}

pub struct FakeStub
{
    pub port: u16,
    pub state: Arc<Mutex<StubState>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeStub
{
    pub fn start(options: StubOptions) -> Self
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(StubState::default()));

        let shared = Arc::clone(&state);
        let handle = thread::spawn(move || {
            if let Ok((socket, _)) = listener.accept() {
                // The client closing mid-write ends the session like EOF does.
                let _ = serve(socket, &options, &shared);
            }
        });

        Self {
            port,
            state,
            handle: Some(handle),
        }
    }

    pub fn config(&self) -> ClientConfig
    {
        ClientConfig::new("127.0.0.1", self.port).with_timeout(Duration::from_secs(2))
    }

    pub fn packets(&self) -> Vec<String>
    {
        self.state.lock().unwrap().packets.clone()
    }

    pub fn seed_memory(&self, address: u64, bytes: &[u8])
    {
        let mut state = self.state.lock().unwrap();
        for (offset, &byte) in bytes.iter().enumerate() {
            state.memory.insert(address + offset as u64, byte);
        }
    }

    pub fn set_registers(&self, registers: RegisterSet)
    {
        self.state.lock().unwrap().registers = registers;
    }

    /// Wait for the stub thread to see the connection close.
    pub fn join(mut self)
    {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

fn serve(mut socket: TcpStream, options: &StubOptions, state: &Mutex<StubState>) -> io::Result<()>
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        // Acks from the client carry no information for the stub.
        match buffer.iter().position(|&byte| byte == b'$') {
            Some(start) => {
                buffer.drain(..start);
            }
            None => buffer.clear(),
        }

        if let Some(len) = packet::complete_frame_len(&buffer) {
            let frame: Vec<u8> = buffer.drain(..len).collect();
            let Ok(payload) = packet::decode(&frame) else {
                socket.write_all(b"-")?;
                continue;
            };
            let payload = String::from_utf8(payload).unwrap();

            let count = {
                let mut state = state.lock().unwrap();
                state.packets.push(payload.clone());
                state.packets.len()
            };
            if options.hang_up_at == Some(count) {
                return Ok(());
            }
            if options.nak_first && count == 1 {
                socket.write_all(b"-")?;
                continue;
            }

            socket.write_all(b"+")?;
            if payload == "c" && options.continue_hangs {
                continue;
            }
            let reply = respond(&payload, options, &mut state.lock().unwrap());
            socket.write_all(&packet::encode(reply.as_bytes()))?;
            continue;
        }

        let read = socket.read(&mut chunk)?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

fn respond(payload: &str, options: &StubOptions, state: &mut StubState) -> String
{
    let Some(command) = payload.chars().next() else {
        return String::new();
    };
    let args = &payload[1..];

    match command {
        'm' => {
            let (address, length) = parse_pair(args);
            if address + length > MEMORY_LIMIT {
                return "E01".to_string();
            }
            let bytes: Vec<u8> = (address..address + length)
                .map(|addr| state.memory.get(&addr).copied().unwrap_or(0))
                .collect();
            hex::encode(&bytes)
        }
        'M' => {
            let (range, data) = args.split_once(':').unwrap();
            let (address, length) = parse_pair(range);
            let bytes = hex::decode(data.as_bytes()).unwrap();
            assert_eq!(bytes.len() as u64, length);
            if address + length > MEMORY_LIMIT {
                return "E01".to_string();
            }
            for (offset, byte) in bytes.into_iter().enumerate() {
                state.memory.insert(address + offset as u64, byte);
            }
            "OK".to_string()
        }
        'g' => state.registers.encode(options.segment_width),
        'G' => {
            let blob = hex::decode(args.as_bytes()).unwrap();
            state.registers = RegisterSet::decode(&blob, options.segment_width).unwrap();
            "OK".to_string()
        }
        'Z' | 'z' if !options.breakpoints_supported => String::new(),
        'Z' | 'z' => {
            let mut fields = args.split(',');
            let kind: u8 = fields.next().unwrap().parse().unwrap();
            let address = hex::parse_u64(fields.next().unwrap().as_bytes()).unwrap();
            if command == 'Z' {
                state.breakpoints.insert((kind, address));
                "OK".to_string()
            } else if state.breakpoints.remove(&(kind, address)) {
                "OK".to_string()
            } else {
                "E02".to_string()
            }
        }
        's' | 'c' => options.stop_reply.clone(),
        _ => String::new(),
    }
}

fn parse_pair(text: &str) -> (u64, u64)
{
    let (first, second) = text.split_once(',').unwrap();
    (
        hex::parse_u64(first.as_bytes()).unwrap(),
        hex::parse_u64(second.as_bytes()).unwrap(),
    )
}
