//! Protocol Module
//!
//! Defines the RCON wire protocol.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────────────┬──────┬──────┐
//! │ Size (4) │  Id (4)  │ Type (4) │   Body (no NUL)   │ 0x00 │ 0x00 │
//! └──────────┴──────────┴──────────┴───────────────────┴──────┴──────┘
//! ```
//!
//! ### Types
//! - 3: AUTH          - Payload: password
//! - 2: EXECCOMMAND   - Payload: command text (also AUTH_RESPONSE from the server)
//! - 0: RESPONSE_VALUE - Payload: command output
//!
//! ### Auth Failure
//! The server echoes request id `-1` instead of the id it was sent.

mod codec;
mod packet;

pub use codec::{
    decode, encode, encode_packet, read_length, read_packet, write_packet, HEADER_SIZE,
    MAX_BODY_LEN, MAX_PACKET_SIZE, MIN_PACKET_SIZE,
};
pub use packet::{Packet, PacketType};

/// Request id the server echoes when authentication fails
pub const AUTH_FAILURE_ID: i32 = -1;
