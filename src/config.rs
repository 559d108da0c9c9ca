//! Configuration for rconlink
//!
//! Centralized client configuration with sensible defaults.

use std::time::Duration;

use crate::error::{RconError, Result};
use crate::protocol::MAX_BODY_LEN;

/// Main configuration for an RCON client session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Timeout Configuration
    // -------------------------------------------------------------------------
    /// TCP connect timeout, applied per resolved address (milliseconds)
    pub connect_timeout_ms: u64,

    /// Deadline for authentication and close (milliseconds)
    pub io_timeout_ms: u64,

    /// Deadline for a whole command: send plus full reassembly (milliseconds)
    pub command_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Protocol Limits
    // -------------------------------------------------------------------------
    /// Longest command body accepted before anything is sent (bytes)
    pub max_command_len: usize,

    /// Ceiling on a reassembled response; `None` disables the check
    pub max_response_size: Option<usize>,

    /// First request id handed out by the session counter
    pub first_request_id: i32,

    // -------------------------------------------------------------------------
    // Socket Configuration
    // -------------------------------------------------------------------------
    /// Disable Nagle's algorithm
    pub nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            io_timeout_ms: 5_000,
            command_timeout_ms: 10_000,
            max_command_len: 1446,
            max_response_size: Some(4 * 1024 * 1024), // 4 MB
            first_request_id: 1,
            nodelay: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Reject values the session cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.first_request_id <= 0 {
            return Err(RconError::Config(format!(
                "first_request_id must be positive, got {}",
                self.first_request_id
            )));
        }
        if self.connect_timeout_ms == 0 || self.io_timeout_ms == 0 || self.command_timeout_ms == 0
        {
            return Err(RconError::Config("timeouts must be non-zero".to_string()));
        }
        if self.max_command_len > MAX_BODY_LEN {
            return Err(RconError::Config(format!(
                "max_command_len {} exceeds the packet body limit {}",
                self.max_command_len, MAX_BODY_LEN
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the authentication / close timeout (in milliseconds)
    pub fn io_timeout_ms(mut self, ms: u64) -> Self {
        self.config.io_timeout_ms = ms;
        self
    }

    /// Set the per-command timeout (in milliseconds)
    pub fn command_timeout_ms(mut self, ms: u64) -> Self {
        self.config.command_timeout_ms = ms;
        self
    }

    /// Set every timeout at once (in milliseconds)
    pub fn timeout_ms(self, ms: u64) -> Self {
        self.connect_timeout_ms(ms).io_timeout_ms(ms).command_timeout_ms(ms)
    }

    /// Set the maximum command length (in bytes)
    pub fn max_command_len(mut self, len: usize) -> Self {
        self.config.max_command_len = len;
        self
    }

    /// Set the reassembled response ceiling (in bytes), or `None` for no limit
    pub fn max_response_size(mut self, size: Option<usize>) -> Self {
        self.config.max_response_size = size;
        self
    }

    /// Set the first request id (must be positive)
    pub fn first_request_id(mut self, id: i32) -> Self {
        self.config.first_request_id = id;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
