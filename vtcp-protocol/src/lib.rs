//! # vtcp-protocol
//!
//! Wire protocol implementation for vtcp (the virtual TCP registry protocol).
//!
//! This crate provides:
//! - One-byte opcodes for the eight socket operations
//! - Fixed-layout, big-endian request and response frames
//! - An incremental decoder that tolerates partially received frames
//! - Stable status codes carried in response frames

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use error::{ProtocolError, StatusCode};
pub use message::{Opcode, Request, Response, ResponseShape};

/// Index of an entry in the registry's socket table.
pub type SocketHandle = u32;

/// Peer handle reported by ACCEPT when no peer could be resolved.
pub const INVALID_HANDLE: SocketHandle = u32::MAX;

/// Default port for the registry.
pub const DEFAULT_PORT: u16 = 12345;

/// Largest payload a single SEND or RECV frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;
