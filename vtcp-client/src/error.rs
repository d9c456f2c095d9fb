//! Client error types.

use thiserror::Error;
use vtcp_protocol::{SocketHandle, StatusCode};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] vtcp_protocol::ProtocolError),

    #[error("virtual network is not running")]
    NotRunning,

    #[error("unsupported socket parameters: {family:?}/{socket_type:?}/protocol {protocol}")]
    UnsupportedAddressFamilyOrType {
        family: crate::client::AddressFamily,
        socket_type: crate::client::SocketType,
        protocol: i32,
    },

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("registry returned {0}")]
    Status(StatusCode),

    #[error("registry returned unknown status {0}")]
    UnknownStatus(u16),

    #[error("registry could not create a socket")]
    CreateFailed,

    #[error("accept on socket {0} failed")]
    AcceptFailed(SocketHandle),
}

impl ClientError {
    /// Maps a wire status to `Ok(())` or the matching error.
    pub fn check_status(status: u16) -> Result<(), ClientError> {
        match StatusCode::from_u16(status) {
            Some(code) if code.is_ok() => Ok(()),
            Some(code) => Err(ClientError::Status(code)),
            None => Err(ClientError::UnknownStatus(status)),
        }
    }
}
