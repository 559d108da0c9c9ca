//! Session state machine
//!
//! Holds every piece of per-connection protocol state except the socket:
//! phase, request-id counter and the one in-flight request. It performs no
//! I/O. The client bindings drive it, handing it the frames they read and
//! writing the bytes it produces, so blocking and cooperative clients share
//! one implementation of the protocol rules.

use std::time::{Instant, SystemTime};

use bytes::{Bytes, BytesMut};

use super::Reassembler;
use crate::config::Config;
use crate::error::{RconError, Result};
use crate::protocol::{self, Packet, PacketType, AUTH_FAILURE_ID};

/// Session lifecycle
///
/// ```text
/// Disconnected → Connecting → Connected → Authenticating → Ready → Closed
///        └──────────────┴───────────┴────────────┴──────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Ready,
    Closed,
    Failed,
}

impl Phase {
    /// `Closed` and `Failed` admit no further protocol operations
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Closed | Phase::Failed)
    }
}

// =============================================================================
// Request Ids
// =============================================================================

/// Monotonic request-id counter
///
/// Hands out ids in `1..=i32::MAX` and wraps back to 1, so `-1` (the auth
/// failure marker) is never produced.
#[derive(Debug, Clone)]
pub struct RequestIdGenerator {
    next: i32,
}

impl RequestIdGenerator {
    pub fn new(first: i32) -> Self {
        Self {
            next: if first > 0 { first } else { 1 },
        }
    }

    pub fn next_id(&mut self) -> i32 {
        let id = self.next;
        self.next = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    /// The id the next call will return
    pub fn peek(&self) -> i32 {
        self.next
    }
}

// =============================================================================
// Exchanges
// =============================================================================

/// An authentication round trip in progress
#[derive(Debug)]
pub struct AuthExchange {
    /// Id sent with the AUTH frame
    pub request_id: i32,

    /// Encoded AUTH frame
    pub frame: Bytes,

    skipped_empty_value: bool,
}

/// Outcome of feeding one frame to an `AuthExchange`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProgress {
    Authenticated,

    /// Another frame is expected
    Pending,
}

impl AuthExchange {
    /// Interpret a frame received while authenticating
    ///
    /// An echoed `-1` is a rejected password whatever the type or body. Some
    /// servers send one empty RESPONSE_VALUE before the real auth response;
    /// that frame is skipped once.
    pub fn accept(&mut self, packet: &Packet) -> Result<AuthProgress> {
        if packet.request_id == AUTH_FAILURE_ID {
            return Err(RconError::Authentication);
        }

        if packet.request_id != self.request_id {
            return Err(RconError::Protocol(format!(
                "Auth response id {} does not match request {}",
                packet.request_id, self.request_id
            )));
        }

        match packet.packet_type {
            PacketType::AUTH_RESPONSE => Ok(AuthProgress::Authenticated),
            PacketType::ResponseValue if packet.body.is_empty() && !self.skipped_empty_value => {
                self.skipped_empty_value = true;
                Ok(AuthProgress::Pending)
            }
            other => Err(RconError::Protocol(format!(
                "Unexpected packet type {} during authentication",
                other.as_i32()
            ))),
        }
    }
}

/// A command round trip in progress
#[derive(Debug)]
pub struct CommandExchange {
    /// Command frame followed by the empty sentinel frame
    pub frames: Bytes,

    /// Consumes the server's reply frames
    pub reassembler: Reassembler,

    /// Deadline for the whole exchange
    pub deadline: Instant,
}

// =============================================================================
// Session Core
// =============================================================================

/// Usage counters for one session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Commands whose response was fully reassembled
    pub commands_issued: u64,

    /// When the TCP connection came up
    pub connected_at: Option<SystemTime>,

    /// When authentication succeeded
    pub authenticated_at: Option<SystemTime>,

    /// When the session was closed or failed
    pub ended_at: Option<SystemTime>,
}

/// The outstanding command
#[derive(Debug, Clone)]
struct Request {
    request_id: i32,
    command: String,
    started_at: Instant,
}

/// Protocol state of one session
#[derive(Debug)]
pub struct SessionCore {
    phase: Phase,
    ids: RequestIdGenerator,
    in_flight: Option<Request>,
    stats: SessionStats,
    config: Config,
}

impl SessionCore {
    pub fn new(config: Config) -> Self {
        Self {
            phase: Phase::Disconnected,
            ids: RequestIdGenerator::new(config.first_request_id),
            in_flight: None,
            stats: SessionStats::default(),
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Command text of the outstanding request, if any
    pub fn in_flight_command(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|r| r.command.as_str())
    }

    fn check_phase(&self, operation: &'static str, expected: Phase) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(RconError::SessionClosed);
        }
        if self.phase != expected {
            return Err(RconError::InvalidPhase {
                operation,
                phase: self.phase,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: Phase) {
        tracing::debug!("Session {:?} -> {:?}", self.phase, to);
        self.phase = to;
    }

    // -------------------------------------------------------------------------
    // Connect
    // -------------------------------------------------------------------------

    pub fn begin_connect(&mut self) -> Result<()> {
        self.check_phase("connect", Phase::Disconnected)?;
        self.transition(Phase::Connecting);
        Ok(())
    }

    /// Finish connecting. Returns false if the session was closed or failed
    /// while the connection was being opened; the caller must then release it.
    pub fn connected(&mut self) -> bool {
        if self.phase != Phase::Connecting {
            return false;
        }
        self.stats.connected_at = Some(SystemTime::now());
        self.transition(Phase::Connected);
        true
    }

    // -------------------------------------------------------------------------
    // Authenticate
    // -------------------------------------------------------------------------

    /// Start authentication; the caller sends `frame` and feeds replies to
    /// `AuthExchange::accept`.
    pub fn begin_auth(&mut self, password: &str) -> Result<AuthExchange> {
        self.check_phase("authenticate", Phase::Connected)?;

        let request_id = self.ids.next_id();
        let frame = protocol::encode_packet(&Packet::auth(request_id, password))?;

        self.transition(Phase::Authenticating);
        Ok(AuthExchange {
            request_id,
            frame,
            skipped_empty_value: false,
        })
    }

    pub fn authenticated(&mut self) {
        if self.phase == Phase::Authenticating {
            self.stats.authenticated_at = Some(SystemTime::now());
            self.transition(Phase::Ready);
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Start a command
    ///
    /// Fails with `SessionBusy` while another command is outstanding, without
    /// touching any state. On success the session is busy until
    /// `complete_command` or `fail`.
    pub fn begin_command(&mut self, command: &str) -> Result<CommandExchange> {
        if self.phase == Phase::Ready && self.in_flight.is_some() {
            return Err(RconError::SessionBusy);
        }
        self.check_phase("issue_command", Phase::Ready)?;

        if command.len() > self.config.max_command_len {
            return Err(RconError::Encoding(format!(
                "Command too long: {} bytes (max {})",
                command.len(),
                self.config.max_command_len
            )));
        }

        // Encode before allocating ids so a rejected command leaves no trace
        let mut scratch = self.ids.clone();
        let request_id = scratch.next_id();
        let sentinel_id = scratch.next_id();

        let command_frame = protocol::encode_packet(&Packet::command(request_id, command))?;
        let sentinel_frame = protocol::encode(sentinel_id, PacketType::ResponseValue, b"")?;

        let mut frames = BytesMut::with_capacity(command_frame.len() + sentinel_frame.len());
        frames.extend_from_slice(&command_frame);
        frames.extend_from_slice(&sentinel_frame);

        self.ids = scratch;
        let started_at = Instant::now();
        self.in_flight = Some(Request {
            request_id,
            command: command.to_string(),
            started_at,
        });

        tracing::trace!("Command {} issued (sentinel {})", request_id, sentinel_id);

        Ok(CommandExchange {
            frames: frames.freeze(),
            reassembler: Reassembler::new(
                request_id,
                sentinel_id,
                self.config.max_response_size,
            ),
            deadline: started_at + self.config.command_timeout(),
        })
    }

    /// Mark the outstanding command as answered
    pub fn complete_command(&mut self) {
        if let Some(request) = self.in_flight.take() {
            self.stats.commands_issued += 1;
            tracing::debug!(
                "Command {} completed in {:?}",
                request.request_id,
                request.started_at.elapsed()
            );
        }
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Move to `Failed` after an unrecoverable error
    pub fn fail(&mut self, err: &RconError) {
        if self.phase.is_terminal() {
            return;
        }
        tracing::warn!("Session failed in {:?}: {}", self.phase, err);
        self.in_flight = None;
        self.stats.ended_at = Some(SystemTime::now());
        self.phase = Phase::Failed;
    }

    /// Move to `Closed`. Returns false if already closed.
    pub fn close(&mut self) -> bool {
        if self.phase == Phase::Closed {
            return false;
        }
        self.in_flight = None;
        if self.stats.ended_at.is_none() {
            self.stats.ended_at = Some(SystemTime::now());
        }
        self.transition(Phase::Closed);
        true
    }
}
