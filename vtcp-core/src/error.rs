//! Core error types.

use crate::SocketHandle;
use thiserror::Error;
use vtcp_protocol::StatusCode;

/// Errors from the socket table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid handle: {handle} (table has {len} entries)")]
    InvalidHandle { handle: SocketHandle, len: usize },

    #[error("socket {handle} is already connected to {partner}")]
    AlreadyConnected {
        handle: SocketHandle,
        partner: SocketHandle,
    },

    #[error("socket table is full ({max} entries)")]
    TableFull { max: usize },
}

impl CoreError {
    /// Returns the status code reported to clients for this error.
    ///
    /// `TableFull` has none: SOCKET answers it with `INVALID_HANDLE`.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            CoreError::InvalidHandle { .. } => Some(StatusCode::InvalidHandle),
            CoreError::AlreadyConnected { .. } => Some(StatusCode::AlreadyConnected),
            CoreError::TableFull { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = CoreError::InvalidHandle { handle: 5, len: 2 };
        assert_eq!(err.status_code(), Some(StatusCode::InvalidHandle));
        assert!(err.to_string().contains('5'));

        let err = CoreError::AlreadyConnected {
            handle: 1,
            partner: 0,
        };
        assert_eq!(err.status_code(), Some(StatusCode::AlreadyConnected));

        let err = CoreError::TableFull { max: 2 };
        assert_eq!(err.status_code(), None);
        assert!(err.to_string().contains("full"));
    }
}
