//! Blocking TCP transport
//!
//! Resolves the host (IPv4 or IPv6), connects with a timeout and performs
//! deadline-bounded exact reads and full writes on a `std::net::TcpStream`.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Instant;

use bytes::{Bytes, BytesMut};

use super::{classify_io, Transport};
use crate::config::Config;
use crate::error::{RconError, Result};

/// Blocking transport over one TCP connection
pub struct TcpTransport {
    /// `None` once closed
    stream: Option<TcpStream>,

    /// Peer address for logging
    peer_addr: String,
}

impl TcpTransport {
    /// Resolve `host` and connect to the first address that accepts
    pub fn connect(host: &str, port: u16, config: &Config) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| RconError::Connection(format!("Failed to resolve {}: {}", host, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(RconError::Connection(format!(
                "No addresses found for {}",
                host
            )));
        }

        let mut last_err = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, config.connect_timeout()) {
                Ok(stream) => {
                    tracing::debug!("Connected to {} ({}:{})", addr, host, port);
                    return Self::from_stream(stream, config);
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(RconError::Connection(format!(
            "Failed to connect to {}:{}: {}",
            host,
            port,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(config.nodelay)?;

        Ok(Self {
            stream: Some(stream),
            peer_addr,
        })
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(RconError::ConnectionClosed)
    }

    /// Drop the socket after a failed read or write; a half-read frame cannot
    /// be resumed.
    fn poison(&mut self, err: RconError) -> RconError {
        if let Some(stream) = self.stream.take() {
            tracing::debug!("Dropping connection to {} after error: {}", self.peer_addr, err);
            let _ = stream.shutdown(Shutdown::Both);
        }
        err
    }

    fn read_into(&mut self, buf: &mut [u8], deadline: Instant) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RconError::Timeout);
            }

            let stream = self.stream()?;
            stream.set_read_timeout(Some(remaining))?;

            match stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(RconError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify_io(e)),
            }
        }
        Ok(())
    }

    fn write_from(&mut self, bytes: &[u8], deadline: Instant) -> Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RconError::Timeout);
            }

            let stream = self.stream()?;
            stream.set_write_timeout(Some(remaining))?;

            match stream.write(&bytes[written..]) {
                Ok(0) => return Err(RconError::ConnectionClosed),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(classify_io(e)),
            }
        }
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn read_exact(&mut self, n: usize, deadline: Instant) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(n);
        match self.read_into(&mut buf, deadline) {
            Ok(()) => {
                tracing::trace!("Read {} bytes from {}", n, self.peer_addr);
                Ok(buf.freeze())
            }
            Err(e) => Err(self.poison(e)),
        }
    }

    fn write_all(&mut self, bytes: &[u8], deadline: Instant) -> Result<()> {
        match self.write_from(bytes, deadline) {
            Ok(()) => {
                tracing::trace!("Wrote {} bytes to {}", bytes.len(), self.peer_addr);
                Ok(())
            }
            Err(e) => Err(self.poison(e)),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            tracing::debug!("Closing connection to {}", self.peer_addr);
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                // Already torn down by the peer
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(RconError::Io(e)),
            }
        }
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
