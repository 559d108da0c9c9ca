//! Packet definitions
//!
//! A single frame on the wire, after the size field has been stripped.

use bytes::Bytes;

/// Packet type field
///
/// The value `2` means "execute command" when the client sends it and
/// "auth response" when the server sends it during authentication. Which
/// one applies is decided by the session phase, never by this value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// `SERVERDATA_RESPONSE_VALUE` (0): command output from the server
    ResponseValue,

    /// `SERVERDATA_EXECCOMMAND` / `SERVERDATA_AUTH_RESPONSE` (2)
    ExecCommand,

    /// `SERVERDATA_AUTH` (3): login request from the client
    Auth,

    /// Any value this client does not recognize
    Other(i32),
}

impl PacketType {
    /// Server reply to an auth request; shares its value with `ExecCommand`
    pub const AUTH_RESPONSE: PacketType = PacketType::ExecCommand;

    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => PacketType::ResponseValue,
            2 => PacketType::ExecCommand,
            3 => PacketType::Auth,
            other => PacketType::Other(other),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            PacketType::ResponseValue => 0,
            PacketType::ExecCommand => 2,
            PacketType::Auth => 3,
            PacketType::Other(value) => value,
        }
    }
}

/// A decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Client-chosen id, echoed by the server (-1 on failed auth)
    pub request_id: i32,

    /// Raw type field
    pub packet_type: PacketType,

    /// Body without the two trailing NUL bytes
    pub body: Bytes,
}

impl Packet {
    pub fn new(request_id: i32, packet_type: PacketType, body: impl Into<Bytes>) -> Self {
        Self {
            request_id,
            packet_type,
            body: body.into(),
        }
    }

    /// Build a login request
    pub fn auth(request_id: i32, password: &str) -> Self {
        Self::new(
            request_id,
            PacketType::Auth,
            Bytes::copy_from_slice(password.as_bytes()),
        )
    }

    /// Build a command request
    pub fn command(request_id: i32, command: &str) -> Self {
        Self::new(
            request_id,
            PacketType::ExecCommand,
            Bytes::copy_from_slice(command.as_bytes()),
        )
    }

    /// Body as text, replacing invalid UTF-8
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
