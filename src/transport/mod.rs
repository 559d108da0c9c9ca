//! Transport Module
//!
//! Owns the raw byte stream under a session.
//!
//! ## Architecture
//! - `Transport`: blocking calls, one thread per connection
//! - `AsyncTransport`: suspends at read/write, for cooperative runtimes
//!
//! Both expose the same three operations with the same failure kinds, so the
//! session logic above them is written once. Every read and write takes an
//! absolute deadline; once a deadline passes the transport is unusable.

mod stream;
mod tcp;

use std::io;
use std::time::Instant;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use crate::error::{RconError, Result};
use crate::protocol::{self, Packet, HEADER_SIZE};

pub use stream::{AsyncStreamTransport, AsyncTcpTransport};
pub use tcp::TcpTransport;

/// Blocking byte transport
pub trait Transport: Send {
    /// Read exactly `n` bytes, accumulating short reads
    fn read_exact(&mut self, n: usize, deadline: Instant) -> Result<Bytes>;

    /// Write the whole buffer, retrying partial writes
    fn write_all(&mut self, bytes: &[u8], deadline: Instant) -> Result<()>;

    /// Release the connection. Safe to call more than once.
    fn close(&mut self) -> Result<()>;

    /// Read one complete frame
    fn read_packet(&mut self, deadline: Instant) -> Result<Packet> {
        let header = self.read_exact(HEADER_SIZE, deadline)?;
        let size = protocol::read_length(header_array(&header)?)? as usize;
        let rest = self.read_exact(size, deadline)?;
        decode_frame(&header, &rest)
    }
}

/// Cooperative byte transport
#[async_trait]
pub trait AsyncTransport: Send {
    /// Read exactly `n` bytes, accumulating short reads
    async fn read_exact(&mut self, n: usize, deadline: Instant) -> Result<Bytes>;

    /// Write the whole buffer, retrying partial writes
    async fn write_all(&mut self, bytes: &[u8], deadline: Instant) -> Result<()>;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Read one complete frame
    async fn read_packet(&mut self, deadline: Instant) -> Result<Packet> {
        let header = self.read_exact(HEADER_SIZE, deadline).await?;
        let size = protocol::read_length(header_array(&header)?)? as usize;
        let rest = self.read_exact(size, deadline).await?;
        decode_frame(&header, &rest)
    }
}

fn header_array(header: &[u8]) -> Result<[u8; HEADER_SIZE]> {
    header
        .try_into()
        .map_err(|_| RconError::Decoding(format!("Short header: {} bytes", header.len())))
}

fn decode_frame(header: &[u8], rest: &[u8]) -> Result<Packet> {
    let mut frame = BytesMut::with_capacity(header.len() + rest.len());
    frame.extend_from_slice(header);
    frame.extend_from_slice(rest);
    protocol::decode(&frame)
}

/// Map a socket error onto the session error taxonomy
pub(crate) fn classify_io(err: io::Error) -> RconError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::WriteZero => RconError::ConnectionClosed,
        // Unix reports an expired socket timeout as WouldBlock, Windows as TimedOut
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => RconError::Timeout,
        _ => RconError::Io(err),
    }
}
