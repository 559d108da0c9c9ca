//! Blocking client
//!
//! Each call occupies the calling thread until it finishes. The client can
//! be shared behind an `Arc`, but it never queues: a command issued while
//! another is outstanding fails with `SessionBusy`. Use one client per
//! thread for parallel commands.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::audit::{self, AuditSink};
use crate::config::Config;
use crate::error::{RconError, Result};
use crate::session::{AuthProgress, Phase, SessionCore, SessionStats};
use crate::transport::{TcpTransport, Transport};

/// Blocking RCON client over one connection
pub struct Client<T: Transport = TcpTransport> {
    /// Protocol state; held only for short, non-I/O sections
    core: Mutex<SessionCore>,

    /// The connection, exclusively owned. `None` before connect and after
    /// close or failure.
    transport: Mutex<Option<T>>,

    /// Optional audit collaborator
    audit: Option<Arc<dyn AuditSink>>,
}

impl Client<TcpTransport> {
    /// Create a disconnected client
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: Mutex::new(SessionCore::new(config)),
            transport: Mutex::new(None),
            audit: None,
        })
    }

    /// Connect and authenticate in one step
    ///
    /// The connection is released if either step fails.
    pub fn open(host: &str, port: u16, password: &str, config: Config) -> Result<Self> {
        let client = Self::new(config)?;
        client.connect(host, port)?;
        client.authenticate(password)?;
        Ok(client)
    }

    /// Open the TCP connection
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        let config = {
            let mut core = self.core.lock();
            core.begin_connect()?;
            core.config().clone()
        };

        match TcpTransport::connect(host, port, &config) {
            Ok(transport) => {
                *self.transport.lock() = Some(transport);
                // A close on another thread may have won the race
                if !self.core.lock().connected() {
                    self.release()?;
                    return Err(RconError::SessionClosed);
                }
                tracing::info!("Connected to {}:{}", host, port);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}

impl<T: Transport> Client<T> {
    /// Wrap a transport that is already connected
    pub fn with_transport(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        let mut core = SessionCore::new(config);
        core.begin_connect()?;
        core.connected();

        Ok(Self {
            core: Mutex::new(core),
            transport: Mutex::new(Some(transport)),
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
    ///
    /// Fails with `Authentication` if the server rejects it; the session is
    /// closed in that case.
    pub fn authenticate(&self, password: &str) -> Result<()> {
        let (mut exchange, deadline) = {
            let mut core = self.core.lock();
            let exchange = core.begin_auth(password)?;
            (exchange, Instant::now() + core.config().io_timeout())
        };

        let result = self.on_transport(|transport| {
            transport.write_all(&exchange.frame, deadline)?;
            loop {
                let packet = transport.read_packet(deadline)?;
                if exchange.accept(&packet)? == AuthProgress::Authenticated {
                    return Ok(());
                }
            }
        });

        match result {
            Ok(()) => {
                self.core.lock().authenticated();
                tracing::info!("Authenticated");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Run a command and return its full output
    ///
    /// Multi-frame responses are joined. Any error other than `SessionBusy`,
    /// `InvalidPhase` or a rejected command text closes the session.
    pub fn issue_command(&self, command: &str) -> Result<String> {
        let mut exchange = self.core.lock().begin_command(command)?;
        let deadline = exchange.deadline;

        let result = self.on_transport(|transport| {
            transport.write_all(&exchange.frames, deadline)?;
            loop {
                let packet = transport.read_packet(deadline)?;
                if let Some(response) = exchange.reassembler.push(packet)? {
                    return Ok(response);
                }
            }
        });

        match result {
            Ok(response) => {
                self.core.lock().complete_command();
                audit::emit(self.audit.as_deref(), command, &response);
                Ok(response)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Close the session and release the connection
    ///
    /// Idempotent. Waits for an in-flight command on another thread to end.
    pub fn close(&self) -> Result<()> {
        if self.core.lock().close() {
            tracing::info!("Session closed");
        }
        self.release()
    }

    /// Run `f` against the live connection
    fn on_transport<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut guard = self.transport.lock();
        let transport = guard.as_mut().ok_or(RconError::SessionClosed)?;
        f(transport)
    }

    /// Record a fatal error and drop the connection
    fn fail(&self, err: RconError) -> RconError {
        self.core.lock().fail(&err);
        if let Err(close_err) = self.release() {
            tracing::debug!("Error releasing failed connection: {}", close_err);
        }
        err
    }

    fn release(&self) -> Result<()> {
        let taken = self.transport.lock().take();
        match taken {
            Some(mut transport) => transport.close(),
            None => Ok(()),
        }
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.get_mut().take() {
            let _ = transport.close();
        }
    }
}
