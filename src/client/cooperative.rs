//! Cooperative (async) client
//!
//! Same operations and errors as the blocking client, suspending only at
//! transport reads and writes. Independent clients interleave freely on one
//! runtime; on a single client a second command started while one is
//! outstanding fails with `SessionBusy`.
//!
//! Dropping a connect, authenticate or command future before it finishes
//! leaves the session half way through a step, so the session is failed and
//! the connection released.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::audit::{self, AuditSink};
use crate::config::Config;
use crate::error::{RconError, Result};
use crate::session::{
    AuthExchange, AuthProgress, CommandExchange, Phase, SessionCore, SessionStats,
};
use crate::transport::{AsyncTcpTransport, AsyncTransport};

/// Cooperative RCON client over one connection
pub struct AsyncClient<T: AsyncTransport = AsyncTcpTransport> {
    /// Protocol state; never held across an await
    core: Mutex<SessionCore>,

    /// The connection, exclusively owned
    transport: tokio::sync::Mutex<Option<T>>,

    audit: Option<Arc<dyn AuditSink>>,
}

impl AsyncClient<AsyncTcpTransport> {
    /// Create a disconnected client
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: Mutex::new(SessionCore::new(config)),
            transport: tokio::sync::Mutex::new(None),
            audit: None,
        })
    }

    /// Connect and authenticate in one step
    pub async fn open(host: &str, port: u16, password: &str, config: Config) -> Result<Self> {
        let client = Self::new(config)?;
        client.connect(host, port).await?;
        client.authenticate(password).await?;
        Ok(client)
    }

    /// Open the TCP connection
    pub async fn connect(&self, host: &str, port: u16) -> Result<()> {
        let config = {
            let mut core = self.core.lock();
            core.begin_connect()?;
            core.config().clone()
        };

        let mut guard = CancelGuard::new(self);
        match AsyncTcpTransport::connect(host, port, &config).await {
            Ok(transport) => {
                *self.transport.lock().await = Some(transport);
                guard.disarm();
                // A concurrent close may have won the race
                if !self.core.lock().connected() {
                    self.release().await?;
                    return Err(RconError::SessionClosed);
                }
                tracing::info!("Connected to {}:{}", host, port);
                Ok(())
            }
            Err(e) => {
                guard.disarm();
                Err(self.fail(e).await)
            }
        }
    }
}

impl<T: AsyncTransport> AsyncClient<T> {
    /// Wrap a transport that is already connected
    pub fn with_transport(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        let mut core = SessionCore::new(config);
        core.begin_connect()?;
        core.connected();

        Ok(Self {
            core: Mutex::new(core),
            transport: tokio::sync::Mutex::new(Some(transport)),
            audit: None,
        })
    }

    /// Attach an audit sink
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn phase(&self) -> Phase {
        self.core.lock().phase()
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    pub fn stats(&self) -> SessionStats {
        self.core.lock().stats().clone()
    }

    /// Log in with the RCON password
    pub async fn authenticate(&self, password: &str) -> Result<()> {
        let (mut exchange, deadline) = {
            let mut core = self.core.lock();
            let exchange = core.begin_auth(password)?;
            (exchange, Instant::now() + core.config().io_timeout())
        };
        let mut guard = CancelGuard::new(self);

        let result = {
            let mut slot = self.transport.lock().await;
            match slot.as_mut() {
                Some(transport) => run_auth(transport, &mut exchange, deadline).await,
                None => Err(RconError::SessionClosed),
            }
        };
        guard.disarm();

        match result {
            Ok(()) => {
                self.core.lock().authenticated();
                tracing::info!("Authenticated");
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Run a command and return its full output
    pub async fn issue_command(&self, command: &str) -> Result<String> {
        let mut exchange = self.core.lock().begin_command(command)?;
        let mut guard = CancelGuard::new(self);

        let result = {
            let mut slot = self.transport.lock().await;
            match slot.as_mut() {
                Some(transport) => run_command(transport, &mut exchange).await,
                None => Err(RconError::SessionClosed),
            }
        };
        guard.disarm();

        match result {
            Ok(response) => {
                self.core.lock().complete_command();
                audit::emit(self.audit.as_deref(), command, &response);
                Ok(response)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Close the session and release the connection. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.core.lock().close() {
            tracing::info!("Session closed");
        }
        self.release().await
    }

    async fn fail(&self, err: RconError) -> RconError {
        self.core.lock().fail(&err);
        if let Err(close_err) = self.release().await {
            tracing::debug!("Error releasing failed connection: {}", close_err);
        }
        err
    }

    async fn release(&self) -> Result<()> {
        let taken = self.transport.lock().await.take();
        match taken {
            Some(mut transport) => transport.close().await,
            None => Ok(()),
        }
    }
}

async fn run_auth<T: AsyncTransport>(
    transport: &mut T,
    exchange: &mut AuthExchange,
    deadline: Instant,
) -> Result<()> {
    transport.write_all(&exchange.frame, deadline).await?;
    loop {
        let packet = transport.read_packet(deadline).await?;
        if exchange.accept(&packet)? == AuthProgress::Authenticated {
            return Ok(());
        }
    }
}

async fn run_command<T: AsyncTransport>(
    transport: &mut T,
    exchange: &mut CommandExchange,
) -> Result<String> {
    transport.write_all(&exchange.frames, exchange.deadline).await?;
    loop {
        let packet = transport.read_packet(exchange.deadline).await?;
        if let Some(response) = exchange.reassembler.push(packet)? {
            return Ok(response);
        }
    }
}

/// Fails the session if an in-flight step is dropped before it ends
struct CancelGuard<'a, T: AsyncTransport> {
    client: &'a AsyncClient<T>,
    armed: bool,
}

impl<'a, T: AsyncTransport> CancelGuard<'a, T> {
    fn new(client: &'a AsyncClient<T>) -> Self {
        Self {
            client,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T: AsyncTransport> Drop for CancelGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let err = RconError::Protocol("operation cancelled before completion".to_string());
        self.client.core.lock().fail(&err);
        // If the lock is still held here, close or drop releases the stream
        if let Ok(mut slot) = self.client.transport.try_lock() {
            slot.take();
        }
    }
}
