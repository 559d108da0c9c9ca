//! Audit record encoders
//!
//! The format is picked once when the log is opened; the writer thread only
//! ever talks to the resulting `RecordEncoder`.

use std::str::FromStr;

use super::AuditRecord;
use crate::error::{RconError, Result};

/// Envelope header: crc (4) + len (4)
pub const ENVELOPE_HEADER_SIZE: usize = 8;

/// Serialization strategy for audit records
pub trait RecordEncoder: Send {
    /// Encode one record, including any framing
    fn encode(&self, record: &AuditRecord) -> Result<Vec<u8>>;

    /// Decode every intact record in `bytes`, skipping corrupt ones
    fn decode_all(&self, bytes: &[u8]) -> Vec<AuditRecord>;
}

/// On-disk audit format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditFormat {
    #[default]
    JsonLines,
    Binary,
}

impl AuditFormat {
    /// Resolve the encoder for this format
    pub fn encoder(self) -> Box<dyn RecordEncoder> {
        match self {
            AuditFormat::JsonLines => Box::new(JsonLinesEncoder),
            AuditFormat::Binary => Box::new(BinaryEncoder),
        }
    }

    /// Conventional file extension
    pub fn extension(self) -> &'static str {
        match self {
            AuditFormat::JsonLines => "jsonl",
            AuditFormat::Binary => "bin",
        }
    }
}

impl FromStr for AuditFormat {
    type Err = RconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "jsonl" | "json-lines" => Ok(AuditFormat::JsonLines),
            "bin" | "binary" => Ok(AuditFormat::Binary),
            other => Err(RconError::Config(format!("Unknown audit format: {}", other))),
        }
    }
}

// =============================================================================
// JSON Lines
// =============================================================================

/// One JSON object per line
#[derive(Debug, Default)]
pub struct JsonLinesEncoder;

impl RecordEncoder for JsonLinesEncoder {
    fn encode(&self, record: &AuditRecord) -> Result<Vec<u8>> {
        let mut line =
            serde_json::to_vec(record).map_err(|e| RconError::Audit(e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }

    fn decode_all(&self, bytes: &[u8]) -> Vec<AuditRecord> {
        bytes
            .split(|&b| b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .filter_map(|line| match serde_json::from_slice(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!("Skipping corrupt audit line: {}", e);
                    None
                }
            })
            .collect()
    }
}

// =============================================================================
// Binary
// =============================================================================

/// bincode payload behind a crc32 + length envelope
#[derive(Debug, Default)]
pub struct BinaryEncoder;

impl RecordEncoder for BinaryEncoder {
    fn encode(&self, record: &AuditRecord) -> Result<Vec<u8>> {
        let payload = bincode::serialize(record).map_err(|e| RconError::Audit(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let mut entry = Vec::with_capacity(ENVELOPE_HEADER_SIZE + payload.len());
        entry.extend_from_slice(&crc.to_le_bytes());
        entry.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        entry.extend_from_slice(&payload);
        Ok(entry)
    }

    fn decode_all(&self, bytes: &[u8]) -> Vec<AuditRecord> {
        let mut records = Vec::new();
        let mut pos = 0;

        while pos + ENVELOPE_HEADER_SIZE <= bytes.len() {
            let crc = u32::from_le_bytes([
                bytes[pos],
                bytes[pos + 1],
                bytes[pos + 2],
                bytes[pos + 3],
            ]);
            let len = u32::from_le_bytes([
                bytes[pos + 4],
                bytes[pos + 5],
                bytes[pos + 6],
                bytes[pos + 7],
            ]) as usize;

            let start = pos + ENVELOPE_HEADER_SIZE;
            let end = match start.checked_add(len) {
                Some(end) if end <= bytes.len() => end,
                // Partial write at the tail
                _ => {
                    tracing::debug!("Truncated audit entry at offset {}", pos);
                    break;
                }
            };

            let payload = &bytes[start..end];
            if crc32fast::hash(payload) != crc {
                tracing::debug!("Checksum mismatch in audit entry at offset {}", pos);
            } else {
                match bincode::deserialize(payload) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::debug!("Undecodable audit entry at offset {}: {}", pos, e),
                }
            }

            pos = end;
        }

        records
    }
}
