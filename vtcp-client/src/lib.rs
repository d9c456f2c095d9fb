//! # vtcp-client
//!
//! Client library for vtcp.
//!
//! This crate provides:
//! - Async TCP connection to the registry
//! - A socket-style API (`create`, `connect`, `bind`, `listen`, `accept`,
//!   `send`, `recv`, `close`) over virtual sockets

pub mod client;
pub mod connection;
pub mod error;

pub use client::{AddressFamily, SocketType, VirtualTcp};
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use vtcp_protocol::{SocketHandle, INVALID_HANDLE};
