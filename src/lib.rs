//! # rconlink
//!
//! Client for the RCON remote administration protocol:
//! - Length-prefixed little-endian packet codec
//! - Password authentication with the `-1` rejection marker
//! - Reassembly of responses the server splits across several packets
//! - Blocking and async bindings sharing one session state machine
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │    Client (blocking)     │      │   AsyncClient (tokio)    │
//! └────────────┬─────────────┘      └────────────┬─────────────┘
//!              │                                 │
//!              └────────────────┬────────────────┘
//!                               ▼
//!               ┌───────────────────────────────┐
//!               │  SessionCore + Reassembler    │
//!               │  (phases, ids, one in flight) │
//!               └───────────────┬───────────────┘
//!                               │
//!          ┌────────────────────┴───────────────────┐
//!          ▼                                        ▼
//!   ┌──────────────┐                        ┌────────────────┐
//!   │  Transport   │                        │ AsyncTransport │
//!   │  (std TCP)   │                        │  (tokio TCP)   │
//!   └──────┬───────┘                        └───────┬────────┘
//!          └───────────────► Packet codec ◄─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use rconlink::{Client, Config};
//!
//! let client = Client::open("localhost", 25575, "password", Config::default())?;
//! let players = client.issue_command("list")?;
//! println!("{}", players);
//! client.close()?;
//! # Ok::<(), rconlink::RconError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod transport;
pub mod session;
pub mod client;
pub mod audit;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RconError, Result};
pub use config::Config;
pub use client::{AsyncClient, Client, DEFAULT_PORT};
pub use session::{Phase, SessionStats};
pub use audit::{AuditFormat, AuditLog, AuditRecord, AuditSink};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rconlink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
