//! # Server Status
//!
//! Live status for the Minecraft servers listed on the portal.
//!
//! ## Components
//!
//! * [`protocol`] - A minimal Server List Ping client: handshake, status
//!   request and ping/pong over a plain TCP connection
//! * [`motd`] - Flattens the chat-component description into display text
//! * [`monitor`] - A per-server cache that answers instantly and refreshes
//!   stale entries in the background
//!
//! ## Request Flow
//!
//! 1. An HTTP handler asks the [`StatusMonitor`] for a server's status
//! 2. The monitor returns whatever it has cached, possibly `pending`
//! 3. If the entry is missing or older than the TTL, one background ping is scheduled
//! 4. The next request sees the fresh result
//!
//! Handlers never wait on the network.

pub mod error;
pub mod monitor;
pub mod motd;
pub mod protocol;

pub use error::StatusError;
pub use monitor::{MonitorConfig, StatusMonitor, StatusSnapshot};
pub use protocol::{parse_address, ping, tcp_reachable, Players, ServerStatus, DEFAULT_PORT};
