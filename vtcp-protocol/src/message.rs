//! Request and response types for the eight registry operations.
//!
//! Frame layouts (all integers big-endian):
//!
//! ```text
//! opcode   request payload                       response payload
//! SOCKET   ip(4) port(2)                         handle(4)
//! CONNECT  handle(4) ip(4) port(2)               status(2)
//! BIND     handle(4) ip(4) port(2)               status(2)
//! LISTEN   handle(4)                             status(2)
//! ACCEPT   handle(4)                             peer_handle(4) peer_ip(4) peer_port(2)
//! SEND     handle(4) length(2) payload(length)   -
//! RECV     handle(4) length(2)                   reserved(2) payload(length)
//! CLOSE    handle(4)                             -
//! ```

use crate::error::{ProtocolError, StatusCode};
use crate::SocketHandle;
use bytes::Bytes;
use std::fmt;
use std::net::Ipv4Addr;

/// Operation codes, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Socket = 0,
    Connect = 1,
    Bind = 2,
    Listen = 3,
    Accept = 4,
    Send = 5,
    Recv = 6,
    Close = 7,
}

impl Opcode {
    /// Number of request bytes that follow the opcode, excluding any SEND
    /// payload.
    pub fn request_body_len(self) -> usize {
        match self {
            Opcode::Socket => 4 + 2,
            Opcode::Connect | Opcode::Bind => 4 + 4 + 2,
            Opcode::Listen | Opcode::Accept | Opcode::Close => 4,
            Opcode::Send | Opcode::Recv => 4 + 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Opcode::Socket => "SOCKET",
            Opcode::Connect => "CONNECT",
            Opcode::Bind => "BIND",
            Opcode::Listen => "LISTEN",
            Opcode::Accept => "ACCEPT",
            Opcode::Send => "SEND",
            Opcode::Recv => "RECV",
            Opcode::Close => "CLOSE",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Socket),
            1 => Ok(Opcode::Connect),
            2 => Ok(Opcode::Bind),
            3 => Ok(Opcode::Listen),
            4 => Ok(Opcode::Accept),
            5 => Ok(Opcode::Send),
            6 => Ok(Opcode::Recv),
            7 => Ok(Opcode::Close),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Socket {
        ip: Ipv4Addr,
        port: u16,
    },
    Connect {
        handle: SocketHandle,
        ip: Ipv4Addr,
        port: u16,
    },
    Bind {
        handle: SocketHandle,
        ip: Ipv4Addr,
        port: u16,
    },
    Listen {
        handle: SocketHandle,
    },
    Accept {
        handle: SocketHandle,
    },
    Send {
        handle: SocketHandle,
        payload: Bytes,
    },
    Recv {
        handle: SocketHandle,
        len: u16,
    },
    Close {
        handle: SocketHandle,
    },
}

impl Request {
    /// Returns the opcode of this request.
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Socket { .. } => Opcode::Socket,
            Request::Connect { .. } => Opcode::Connect,
            Request::Bind { .. } => Opcode::Bind,
            Request::Listen { .. } => Opcode::Listen,
            Request::Accept { .. } => Opcode::Accept,
            Request::Send { .. } => Opcode::Send,
            Request::Recv { .. } => Opcode::Recv,
            Request::Close { .. } => Opcode::Close,
        }
    }

    /// Returns the handle the request targets, if any.
    pub fn handle(&self) -> Option<SocketHandle> {
        match self {
            Request::Socket { .. } => None,
            Request::Connect { handle, .. }
            | Request::Bind { handle, .. }
            | Request::Listen { handle }
            | Request::Accept { handle }
            | Request::Send { handle, .. }
            | Request::Recv { handle, .. }
            | Request::Close { handle } => Some(*handle),
        }
    }

    /// Returns the shape of the response the registry sends back, or `None`
    /// for fire-and-forget operations.
    pub fn response_shape(&self) -> Option<ResponseShape> {
        match self {
            Request::Socket { .. } => Some(ResponseShape::Handle),
            Request::Connect { .. } | Request::Bind { .. } | Request::Listen { .. } => {
                Some(ResponseShape::Status)
            }
            Request::Accept { .. } => Some(ResponseShape::Accepted),
            Request::Recv { len, .. } => Some(ResponseShape::Data(*len)),
            Request::Send { .. } | Request::Close { .. } => None,
        }
    }
}

/// Layout of a response frame. Responses carry no opcode, so the reader must
/// know which one it is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// handle(4)
    Handle,
    /// status(2)
    Status,
    /// peer_handle(4) peer_ip(4) peer_port(2)
    Accepted,
    /// reserved(2) payload(len)
    Data(u16),
}

impl ResponseShape {
    /// Total encoded length of a response of this shape.
    pub fn encoded_len(self) -> usize {
        match self {
            ResponseShape::Handle => 4,
            ResponseShape::Status => 2,
            ResponseShape::Accepted => 4 + 4 + 2,
            ResponseShape::Data(len) => 2 + len as usize,
        }
    }
}

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Handle(SocketHandle),
    Status(u16),
    Accepted {
        handle: SocketHandle,
        ip: Ipv4Addr,
        port: u16,
    },
    Data {
        status: u16,
        payload: Bytes,
    },
}

impl Response {
    /// Builds a status response from a status code.
    pub fn status(code: StatusCode) -> Self {
        Response::Status(code.as_u16())
    }

    /// Builds a RECV response with the reserved field set to zero.
    pub fn data(payload: Bytes) -> Self {
        Response::Data { status: 0, payload }
    }

    pub fn shape(&self) -> ResponseShape {
        match self {
            Response::Handle(_) => ResponseShape::Handle,
            Response::Status(_) => ResponseShape::Status,
            Response::Accepted { .. } => ResponseShape::Accepted,
            Response::Data { payload, .. } => ResponseShape::Data(payload.len() as u16),
        }
    }
}
