//! Audit Module
//!
//! Records every completed command together with its response.
//!
//! The client calls an `AuditSink` after a response is reassembled. Sinks
//! must not block the caller and their failures never touch session state.
//!
//! ## Formats
//! - `JsonLines`: one JSON object per line
//! - `Binary`: bincode payloads in a checksummed envelope
//!
//! ```text
//! ┌─────────┬─────────┬──────────────────┐
//! │ CRC (4) │ Len (4) │ bincode(record)  │
//! └─────────┴─────────┴──────────────────┘
//! ```

mod encoder;
mod writer;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use encoder::{AuditFormat, BinaryEncoder, JsonLinesEncoder, RecordEncoder};
pub use writer::AuditLog;

/// One completed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub command: String,
    pub response: String,

    /// UTC seconds since the Unix epoch
    pub timestamp: f64,
}

impl AuditRecord {
    /// Create a record stamped with the current time
    pub fn new(command: impl Into<String>, response: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Self {
            command: command.into(),
            response: response.into(),
            timestamp,
        }
    }
}

/// Receiver of audit records
pub trait AuditSink: Send + Sync {
    /// Accept one record. Must return promptly.
    fn record(&self, record: AuditRecord) -> Result<()>;
}

/// Hand a record to an optional sink, logging instead of failing
pub(crate) fn emit(sink: Option<&dyn AuditSink>, command: &str, response: &str) {
    if let Some(sink) = sink {
        if let Err(e) = sink.record(AuditRecord::new(command, response)) {
            tracing::warn!("Audit sink rejected record: {}", e);
        }
    }
}
