//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol. Pure functions
//! over byte buffers, plus blocking stream helpers.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────────────┬──────┬──────┐
//! │ Size (4) │  Id (4)  │ Type (4) │   Body (no NUL)   │ 0x00 │ 0x00 │
//! └──────────┴──────────┴──────────┴───────────────────┴──────┴──────┘
//! ```
//!
//! All integers are little-endian `i32`. `Size` counts every byte after
//! itself: `4 + 4 + len(body) + 2`.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Packet, PacketType};
use crate::error::{RconError, Result};

/// Size field: 4 bytes
pub const HEADER_SIZE: usize = 4;

/// Smallest legal size field: id (4) + type (4) + terminator (2)
pub const MIN_PACKET_SIZE: i32 = 10;

/// Largest size field accepted from a peer (1 MB)
///
/// The server fragments long output rather than growing a frame, so
/// anything near this is a corrupt or hostile length.
pub const MAX_PACKET_SIZE: i32 = 1024 * 1024;

/// Largest body `encode` can express in a signed 32-bit size field
pub const MAX_BODY_LEN: usize = (i32::MAX - MIN_PACKET_SIZE) as usize;

const TERMINATOR: [u8; 2] = [0x00, 0x00];

// =============================================================================
// Packet Encoding/Decoding
// =============================================================================

/// Encode a frame to bytes
///
/// Format: size (4) + request_id (4) + type (4) + body + 0x00 0x00
pub fn encode(request_id: i32, packet_type: PacketType, body: &[u8]) -> Result<Bytes> {
    if body.len() > MAX_BODY_LEN {
        return Err(RconError::Encoding(format!(
            "Body too large: {} bytes (max {})",
            body.len(),
            MAX_BODY_LEN
        )));
    }

    if let Some(pos) = body.iter().position(|&b| b == 0) {
        return Err(RconError::Encoding(format!(
            "Body contains a NUL byte at offset {}",
            pos
        )));
    }

    let size = MIN_PACKET_SIZE + body.len() as i32;

    let mut message = BytesMut::with_capacity(HEADER_SIZE + size as usize);
    message.put_i32_le(size);
    message.put_i32_le(request_id);
    message.put_i32_le(packet_type.as_i32());
    message.put_slice(body);
    message.put_slice(&TERMINATOR);

    Ok(message.freeze())
}

/// Encode a packet to bytes
pub fn encode_packet(packet: &Packet) -> Result<Bytes> {
    encode(packet.request_id, packet.packet_type, &packet.body)
}

/// Decode a frame from bytes
///
/// `raw` must hold exactly the size field plus everything it counts.
pub fn decode(raw: &[u8]) -> Result<Packet> {
    let min_len = HEADER_SIZE + MIN_PACKET_SIZE as usize;
    if raw.len() < min_len {
        return Err(RconError::Decoding(format!(
            "Incomplete packet: expected at least {} bytes, got {}",
            min_len,
            raw.len()
        )));
    }

    let mut header = &raw[..HEADER_SIZE + 8];
    let size = header.get_i32_le();
    let request_id = header.get_i32_le();
    let packet_type = PacketType::from_i32(header.get_i32_le());

    if size < MIN_PACKET_SIZE || HEADER_SIZE + size as usize != raw.len() {
        return Err(RconError::Decoding(format!(
            "Size field {} does not match packet length {}",
            size,
            raw.len()
        )));
    }

    let terminator = &raw[raw.len() - TERMINATOR.len()..];
    if terminator != TERMINATOR {
        return Err(RconError::Decoding(format!(
            "Bad terminator: {:02x?}",
            terminator
        )));
    }

    let body = Bytes::copy_from_slice(&raw[HEADER_SIZE + 8..raw.len() - TERMINATOR.len()]);

    Ok(Packet {
        request_id,
        packet_type,
        body,
    })
}

/// Decode the leading size field
///
/// Returns how many more bytes make up the frame.
pub fn read_length(header: [u8; HEADER_SIZE]) -> Result<i32> {
    let size = i32::from_le_bytes(header);

    if size < MIN_PACKET_SIZE {
        return Err(RconError::Decoding(format!(
            "Packet size too small: {} (min {})",
            size, MIN_PACKET_SIZE
        )));
    }

    if size > MAX_PACKET_SIZE {
        return Err(RconError::Decoding(format!(
            "Packet size too large: {} bytes (max {})",
            size, MAX_PACKET_SIZE
        )));
    }

    Ok(size)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete packet from a stream
///
/// Blocks until a complete packet is received or an error occurs
pub fn read_packet<R: Read>(reader: &mut R) -> Result<Packet> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let size = read_length(header)? as usize;

    let mut frame = vec![0u8; HEADER_SIZE + size];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut frame[HEADER_SIZE..])?;

    decode(&frame)
}

/// Write a packet to a stream
pub fn write_packet<W: Write>(writer: &mut W, packet: &Packet) -> Result<()> {
    let bytes = encode_packet(packet)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
