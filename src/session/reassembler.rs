//! Response reassembly
//!
//! The protocol splits long output across several frames that share one
//! request id and carries no "more follows" marker. After the real command
//! (id `R`) the client sends an empty frame with id `S`. The server answers
//! in order, so every `R` frame arrives before the single `S` echo, which
//! marks the end of the response.

use bytes::BytesMut;

use crate::error::{RconError, Result};
use crate::protocol::{Packet, PacketType};

/// Accumulates the frames of one logical response
#[derive(Debug)]
pub struct Reassembler {
    request_id: i32,
    sentinel_id: i32,
    buffer: BytesMut,
    frames: usize,
    max_size: Option<usize>,
}

impl Reassembler {
    pub fn new(request_id: i32, sentinel_id: i32, max_size: Option<usize>) -> Self {
        debug_assert_ne!(request_id, sentinel_id);
        Self {
            request_id,
            sentinel_id,
            buffer: BytesMut::new(),
            frames: 0,
            max_size,
        }
    }

    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    pub fn sentinel_id(&self) -> i32 {
        self.sentinel_id
    }

    /// Number of `R` frames consumed so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Feed one frame
    ///
    /// Returns the full response once the sentinel echo arrives. Bytes are
    /// joined before UTF-8 decoding so a character split across two frames
    /// survives.
    pub fn push(&mut self, packet: Packet) -> Result<Option<String>> {
        if !matches!(
            packet.packet_type,
            PacketType::ResponseValue | PacketType::ExecCommand
        ) {
            return Err(RconError::Protocol(format!(
                "Unexpected packet type {} in command response (id {})",
                packet.packet_type.as_i32(),
                packet.request_id
            )));
        }

        if packet.request_id == self.sentinel_id {
            tracing::trace!(
                "Sentinel {} received after {} frame(s), {} bytes",
                self.sentinel_id,
                self.frames,
                self.buffer.len()
            );
            let body = std::mem::take(&mut self.buffer);
            return Ok(Some(String::from_utf8_lossy(&body).into_owned()));
        }

        if packet.request_id != self.request_id {
            return Err(RconError::Protocol(format!(
                "Response id {} matches neither request {} nor sentinel {}",
                packet.request_id, self.request_id, self.sentinel_id
            )));
        }

        if let Some(max) = self.max_size {
            if self.buffer.len() + packet.body.len() > max {
                return Err(RconError::Protocol(format!(
                    "Response exceeds {} bytes",
                    max
                )));
            }
        }

        self.frames += 1;
        self.buffer.extend_from_slice(&packet.body);
        tracing::trace!(
            "Fragment {} for request {}: {} bytes",
            self.frames,
            self.request_id,
            packet.body.len()
        );

        Ok(None)
    }
}
