//! Protocol error types and status codes.

use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur while decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("truncated frame: {buffered} bytes buffered when the stream ended")]
    Truncated { buffered: usize },

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("unexpected response for {0}")]
    UnexpectedResponse(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Status codes returned in the two-byte status field of CONNECT, BIND and
/// LISTEN responses and the reserved field of RECV responses.
///
/// These values are part of the protocol contract and must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 0,
    InvalidHandle = 1,
    AlreadyConnected = 2,
    Timeout = 3,
}

impl StatusCode {
    /// Parses a status code from its wire value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(StatusCode::Ok),
            1 => Some(StatusCode::InvalidHandle),
            2 => Some(StatusCode::AlreadyConnected),
            3 => Some(StatusCode::Timeout),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "OK"),
            StatusCode::InvalidHandle => write!(f, "INVALID_HANDLE"),
            StatusCode::AlreadyConnected => write!(f, "ALREADY_CONNECTED"),
            StatusCode::Timeout => write!(f, "TIMEOUT"),
        }
    }
}
