//! Cooperative transport
//!
//! Generic over any tokio stream so the same code runs over a TCP socket in
//! production and an in-memory duplex pipe in tests. A frame is always read
//! or written whole between suspension points of the caller.

use std::time::Instant;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{classify_io, AsyncTransport};
use crate::config::Config;
use crate::error::{RconError, Result};

/// Cooperative transport over a TCP socket
pub type AsyncTcpTransport = AsyncStreamTransport<TcpStream>;

/// Cooperative transport over any async byte stream
pub struct AsyncStreamTransport<S> {
    /// `None` once closed
    stream: Option<S>,

    /// Peer description for logging
    peer_addr: String,
}

impl AsyncStreamTransport<TcpStream> {
    /// Resolve `host` (IPv4 or IPv6) and connect
    pub async fn connect(host: &str, port: u16, config: &Config) -> Result<Self> {
        let connect = TcpStream::connect((host, port));
        let stream = match tokio::time::timeout(config.connect_timeout(), connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(RconError::Connection(format!(
                    "Failed to connect to {}:{}: {}",
                    host, port, e
                )))
            }
            Err(_) => {
                return Err(RconError::Connection(format!(
                    "Connect to {}:{} timed out after {}ms",
                    host, port, config.connect_timeout_ms
                )))
            }
        };

        stream.set_nodelay(config.nodelay)?;

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| format!("{}:{}", host, port));
        tracing::debug!("Connected to {}", peer_addr);

        Ok(Self {
            stream: Some(stream),
            peer_addr,
        })
    }
}

impl<S> AsyncStreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already connected stream
    pub fn new(stream: S, peer_addr: impl Into<String>) -> Self {
        Self {
            stream: Some(stream),
            peer_addr: peer_addr.into(),
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    fn stream(&mut self) -> Result<&mut S> {
        self.stream.as_mut().ok_or(RconError::ConnectionClosed)
    }

    fn poison(&mut self, err: RconError) -> RconError {
        if self.stream.take().is_some() {
            tracing::debug!("Dropping connection to {} after error: {}", self.peer_addr, err);
        }
        err
    }
}

#[async_trait]
impl<S> AsyncTransport for AsyncStreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_exact(&mut self, n: usize, deadline: Instant) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(n);

        let result = match self.stream() {
            Ok(stream) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                match tokio::time::timeout_at(deadline, stream.read_exact(&mut buf)).await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(e)) => Err(classify_io(e)),
                    Err(_) => Err(RconError::Timeout),
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::trace!("Read {} bytes from {}", n, self.peer_addr);
                Ok(buf.freeze())
            }
            Err(e) => Err(self.poison(e)),
        }
    }

    async fn write_all(&mut self, bytes: &[u8], deadline: Instant) -> Result<()> {
        let result = match self.stream() {
            Ok(stream) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                let write = async {
                    stream.write_all(bytes).await?;
                    stream.flush().await
                };
                match tokio::time::timeout_at(deadline, write).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(classify_io(e)),
                    Err(_) => Err(RconError::Timeout),
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::trace!("Wrote {} bytes to {}", bytes.len(), self.peer_addr);
                Ok(())
            }
            Err(e) => Err(self.poison(e)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("Closing connection to {}", self.peer_addr);
            // The socket is released on drop whether or not shutdown succeeds
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Shutdown of {} failed: {}", self.peer_addr, e);
            }
        }
        Ok(())
    }
}
