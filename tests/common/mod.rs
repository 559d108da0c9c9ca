//! Shared test fixtures
//!
//! - `FakeServer`: in-process RCON server on a loopback port
//! - `MockTransport`: scripted in-memory transport with call counters

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use bytes::Bytes;
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use rconlink::protocol::{self, Packet, PacketType};
use rconlink::transport::Transport;
use rconlink::{AuditRecord, AuditSink, Config, RconError};

pub const PASSWORD: &str = "pw";

/// Largest body the fake server puts in one frame
pub const FRAGMENT_SIZE: usize = 4096;

// =============================================================================
// Fake Server
// =============================================================================

/// How the fake server answers one command
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send the text split into `FRAGMENT_SIZE` frames
    Text(String),

    /// Send the text split into frames of the given size
    Chunked(String, usize),

    /// Send this many fragments of the text, then hang up
    DropAfter(String, usize, usize),

    /// Never answer; keep the socket open
    Silent,

    /// Answer with a frame carrying an id nobody asked for
    StrayId(i32),
}

type Handler = dyn Fn(&str) -> Reply + Send + Sync;

/// RCON server running on a background thread
pub struct FakeServer {
    pub port: u16,
}

impl FakeServer {
    /// Start a server that accepts `PASSWORD` and answers with `handler`
    pub fn spawn(handler: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self::spawn_with(PASSWORD, false, handler)
    }

    /// Start a server that echoes every command back
    pub fn echo() -> Self {
        Self::spawn(|cmd| Reply::Text(format!("echo: {}", cmd)))
    }

    /// `pre_ack` sends an empty RESPONSE_VALUE before the auth response
    pub fn spawn_with(
        password: &str,
        pre_ack: bool,
        handler: impl Fn(&str) -> Reply + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handler: Arc<Handler> = Arc::new(handler);
        let password = password.to_string();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let handler = Arc::clone(&handler);
                let password = password.clone();
                thread::spawn(move || serve(stream, &password, pre_ack, handler.as_ref()));
            }
        });

        Self { port }
    }
}

fn send(stream: &mut TcpStream, id: i32, packet_type: PacketType, body: &[u8]) -> bool {
    let bytes = protocol::encode(id, packet_type, body).unwrap();
    stream.write_all(&bytes).is_ok()
}

fn serve(mut stream: TcpStream, password: &str, pre_ack: bool, handler: &Handler) {
    loop {
        let packet = match protocol::read_packet(&mut stream) {
            Ok(packet) => packet,
            Err(_) => return,
        };

        match packet.packet_type {
            PacketType::Auth => {
                if pre_ack {
                    send(&mut stream, packet.request_id, PacketType::ResponseValue, b"");
                }
                let id = if packet.body == password.as_bytes() {
                    packet.request_id
                } else {
                    -1
                };
                if !send(&mut stream, id, PacketType::AUTH_RESPONSE, b"") {
                    return;
                }
            }
            PacketType::ExecCommand => {
                let command = packet.body_text();
                let keep_going = match handler(&command) {
                    Reply::Text(text) => {
                        send_chunks(&mut stream, packet.request_id, &text, FRAGMENT_SIZE, None)
                    }
                    Reply::Chunked(text, size) => {
                        send_chunks(&mut stream, packet.request_id, &text, size, None)
                    }
                    Reply::DropAfter(text, size, frames) => {
                        // Drain the sentinel so the close is a clean FIN
                        let _ = protocol::read_packet(&mut stream);
                        send_chunks(&mut stream, packet.request_id, &text, size, Some(frames));
                        return;
                    }
                    Reply::Silent => {
                        // Swallow the sentinel too, then wait for the client to leave
                        let _ = protocol::read_packet(&mut stream);
                        let _ = protocol::read_packet(&mut stream);
                        return;
                    }
                    Reply::StrayId(id) => {
                        send(&mut stream, id, PacketType::ResponseValue, b"stale")
                    }
                };
                if !keep_going {
                    return;
                }
            }
            // The sentinel: mirror it back empty
            PacketType::ResponseValue => {
                if !send(&mut stream, packet.request_id, PacketType::ResponseValue, b"") {
                    return;
                }
            }
            PacketType::Other(_) => return,
        }
    }
}

fn send_chunks(
    stream: &mut TcpStream,
    id: i32,
    text: &str,
    size: usize,
    limit: Option<usize>,
) -> bool {
    let bytes = text.as_bytes();
    let chunks: Vec<&[u8]> = if bytes.is_empty() {
        vec![&[][..]]
    } else {
        bytes.chunks(size).collect()
    };

    for (i, chunk) in chunks.iter().enumerate() {
        if limit.map_or(false, |max| i >= max) {
            return false;
        }
        if !send(stream, id, PacketType::ResponseValue, chunk) {
            return false;
        }
    }
    true
}

/// Fast-failing config for tests
pub fn test_config() -> Config {
    Config::builder().timeout_ms(2_000).build()
}

/// Audit sink that keeps records in memory
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<AuditRecord>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, record: AuditRecord) -> rconlink::Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

// =============================================================================
// Mock Transport
// =============================================================================

/// Observable state behind a `MockTransport`
#[derive(Default)]
pub struct MockState {
    pub inbound: VecDeque<u8>,
    pub written: Vec<u8>,
    pub writes: usize,
    pub reads: usize,
    pub closes: usize,
}

impl MockState {
    /// Queue a frame for the client to read
    pub fn push(&mut self, id: i32, packet_type: PacketType, body: &[u8]) {
        let bytes = protocol::encode(id, packet_type, body).unwrap();
        self.inbound.extend(bytes.iter().copied());
    }

    /// Decode everything the client has written
    pub fn sent_packets(&self) -> Vec<Packet> {
        let mut cursor = std::io::Cursor::new(self.written.clone());
        let mut packets = Vec::new();
        while (cursor.position() as usize) < self.written.len() {
            packets.push(protocol::read_packet(&mut cursor).unwrap());
        }
        packets
    }
}

/// In-memory transport fed from a shared `MockState`
pub struct MockTransport {
    pub state: Arc<Mutex<MockState>>,

    /// Signalled when the gated read starts
    entered: Option<Sender<()>>,

    /// The gated read blocks until this yields
    gate: Option<Receiver<()>>,

    /// Index of the read that waits on `gate`
    gate_at: usize,
}

impl MockTransport {
    pub fn new() -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let transport = Self {
            state: Arc::clone(&state),
            entered: None,
            gate: None,
            gate_at: 0,
        };
        (transport, state)
    }

    /// Make read number `at_read` (zero-based) wait: returns (entered, release)
    pub fn gated(mut self, at_read: usize) -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        self.entered = Some(entered_tx);
        self.gate = Some(release_rx);
        self.gate_at = at_read;
        (self, entered_rx, release_tx)
    }
}

impl Transport for MockTransport {
    fn read_exact(&mut self, n: usize, _deadline: Instant) -> rconlink::Result<Bytes> {
        let reads = self.state.lock().reads;
        if self.gate.is_some() && reads == self.gate_at {
            if let Some(entered) = self.entered.take() {
                let _ = entered.send(());
            }
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }
        }

        let mut state = self.state.lock();
        state.reads += 1;
        if state.inbound.len() < n {
            state.inbound.clear();
            return Err(RconError::ConnectionClosed);
        }
        let bytes: Vec<u8> = state.inbound.drain(..n).collect();
        Ok(Bytes::from(bytes))
    }

    fn write_all(&mut self, bytes: &[u8], _deadline: Instant) -> rconlink::Result<()> {
        let mut state = self.state.lock();
        state.writes += 1;
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> rconlink::Result<()> {
        self.state.lock().closes += 1;
        Ok(())
    }
}
