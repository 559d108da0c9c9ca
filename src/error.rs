//! Error types for rconlink
//!
//! Provides a unified error type for all operations. Both client bindings
//! surface exactly these variants.

use thiserror::Error;

use crate::session::Phase;

/// Result type alias using RconError
pub type Result<T> = std::result::Result<T, RconError>;

/// Unified error type for rconlink operations
#[derive(Debug, Error)]
pub enum RconError {
    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    /// DNS resolution or TCP connect failed. A new Session may be attempted.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An I/O deadline elapsed. The Session is closed and must not be reused.
    #[error("Operation timed out")]
    Timeout,

    /// The peer closed the socket in the middle of an operation.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The server rejected the password (echoed request id -1).
    #[error("Authentication failed, check the password")]
    Authentication,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    /// A command is already outstanding on this Session.
    #[error("Session busy: a command is already in flight")]
    SessionBusy,

    #[error("Session closed")]
    SessionClosed,

    #[error("Cannot {operation} while session is {phase:?}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    // -------------------------------------------------------------------------
    // Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("Audit error: {0}")]
    Audit(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RconError {
    /// Whether the Session that produced this error is unusable afterwards.
    ///
    /// `SessionBusy`, `InvalidPhase` and `Encoding` are rejected before
    /// anything is sent and leave the Session untouched; everything raised
    /// from the wire is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RconError::SessionBusy
                | RconError::InvalidPhase { .. }
                | RconError::Encoding(_)
                | RconError::Audit(_)
                | RconError::Config(_)
        )
    }

    /// Wrong credentials, as opposed to any other failure.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RconError::Authentication)
    }

    /// The host could not be reached at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, RconError::Connection(_))
    }
}
