//! # vtcp-core
//!
//! Virtual socket registry for vtcp.
//!
//! This crate provides:
//! - Fixed-capacity socket buffers with truncating writes
//! - Virtual socket entries and their connection state machine
//! - The append-only socket table and connect/accept pairing

pub mod buffer;
pub mod error;
pub mod socket;
pub mod table;

pub use buffer::{SocketBuffer, DEFAULT_BUFFER_CAPACITY, MIN_BUFFER_CAPACITY};
pub use error::CoreError;
pub use socket::{PeerInfo, SocketStatus, VirtualSocket};
pub use table::{SocketTable, MAX_SOCKETS};
pub use vtcp_protocol::SocketHandle;
