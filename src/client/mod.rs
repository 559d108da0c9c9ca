//! Client Module
//!
//! Two bindings over one session implementation.
//!
//! ## Bindings
//! - `Client`: blocking, one thread per connection
//! - `AsyncClient`: cooperative, suspends only at transport I/O
//!
//! Both drive `session::SessionCore` and report the same errors. The
//! connection is released when the client is closed, fails, or is dropped.

mod blocking;
mod cooperative;

pub use blocking::Client;
pub use cooperative::AsyncClient;

/// Default RCON port
pub const DEFAULT_PORT: u16 = 25575;
