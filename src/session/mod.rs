//! Session Module
//!
//! Protocol state shared by both client bindings.
//!
//! ## Responsibilities
//! - Sequence connect → authenticate → ready → closed
//! - Own the request-id counter
//! - Enforce one command in flight
//! - Reassemble responses split across frames

mod reassembler;
mod state;

pub use reassembler::Reassembler;
pub use state::{
    AuthExchange, AuthProgress, CommandExchange, Phase, RequestIdGenerator, SessionCore,
    SessionStats,
};
