//! Server error types.

use thiserror::Error;
use vtcp_protocol::StatusCode;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] vtcp_protocol::ProtocolError),

    #[error("registry error: {0}")]
    Core(#[from] vtcp_core::CoreError),

    #[error("rendezvous timed out")]
    RendezvousTimeout,

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns the status code to put on the wire, or `None` if the error
    /// ends the connection instead of being reported.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ServerError::Core(e) => e.status_code(),
            ServerError::RendezvousTimeout => Some(StatusCode::Timeout),
            ServerError::Io(_) | ServerError::Protocol(_) | ServerError::ShuttingDown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtcp_core::CoreError;

    #[test]
    fn test_status_codes() {
        let err = ServerError::from(CoreError::InvalidHandle { handle: 3, len: 1 });
        assert_eq!(err.status_code(), Some(StatusCode::InvalidHandle));
        assert_eq!(
            ServerError::RendezvousTimeout.status_code(),
            Some(StatusCode::Timeout)
        );
        assert_eq!(ServerError::ShuttingDown.status_code(), None);
        assert_eq!(
            ServerError::from(CoreError::TableFull { max: 1 }).status_code(),
            None
        );

        let err = ServerError::from(vtcp_protocol::ProtocolError::UnknownOpcode(9));
        assert_eq!(err.status_code(), None);
    }
}
