//! Socket-style client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use bytes::Bytes;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vtcp_protocol::{Request, Response, SocketHandle, INVALID_HANDLE, MAX_PAYLOAD_SIZE};

/// Address family requested by `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
    Unix,
}

/// Socket type requested by `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    Stream,
    Datagram,
    Raw,
}

/// Socket-style façade over one registry connection.
///
/// Every entry created through a `VirtualTcp` is registered under its local
/// virtual address, which is what peers `connect` to and what `accept`
/// reports back.
pub struct VirtualTcp {
    conn: Connection,
    local: SocketAddrV4,
    running: Arc<AtomicBool>,
}

impl VirtualTcp {
    /// Creates a façade presenting `local` as its virtual address.
    pub fn new(config: ConnectionConfig, local: SocketAddrV4) -> Self {
        Self {
            conn: Connection::new(config),
            local,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shares a process-wide running flag with this façade.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Opens the transport connection to the registry.
    pub async fn start(&self) -> Result<(), ClientError> {
        self.ensure_running()?;
        self.conn.connect().await
    }

    /// Clears the running flag and closes the transport connection.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.running.store(false, Ordering::SeqCst);
        self.conn.close().await
    }

    /// Returns the virtual address entries are registered under.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local
    }

    /// Returns whether the virtual network is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn ensure_running(&self) -> Result<(), ClientError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ClientError::NotRunning)
        }
    }

    async fn request(&self, request: Request) -> Result<Response, ClientError> {
        self.ensure_running()?;
        self.conn
            .request(&request)
            .await?
            .ok_or(vtcp_protocol::ProtocolError::UnexpectedResponse("missing response").into())
    }

    async fn request_status(&self, request: Request) -> Result<(), ClientError> {
        match self.request(request).await? {
            Response::Status(status) => ClientError::check_status(status),
            _ => Err(vtcp_protocol::ProtocolError::UnexpectedResponse("expected status").into()),
        }
    }

    /// Registers a new virtual socket. Only IPv4 stream sockets with the
    /// default protocol are supported.
    pub async fn create(
        &self,
        family: AddressFamily,
        socket_type: SocketType,
        protocol: i32,
    ) -> Result<SocketHandle, ClientError> {
        self.ensure_running()?;
        if family != AddressFamily::Inet || socket_type != SocketType::Stream || protocol != 0 {
            return Err(ClientError::UnsupportedAddressFamilyOrType {
                family,
                socket_type,
                protocol,
            });
        }

        let request = Request::Socket {
            ip: *self.local.ip(),
            port: self.local.port(),
        };
        match self.request(request).await? {
            Response::Handle(INVALID_HANDLE) => Err(ClientError::CreateFailed),
            Response::Handle(handle) => {
                tracing::debug!("Created virtual socket {} at {}", handle, self.local);
                Ok(handle)
            }
            _ => Err(vtcp_protocol::ProtocolError::UnexpectedResponse("expected handle").into()),
        }
    }

    /// Connects `handle` to the entry accepting at `addr`. Blocks until a
    /// matching accept is pending.
    pub async fn connect(&self, handle: SocketHandle, addr: SocketAddrV4) -> Result<(), ClientError> {
        self.request_status(Request::Connect {
            handle,
            ip: *addr.ip(),
            port: addr.port(),
        })
        .await
    }

    pub async fn bind(&self, handle: SocketHandle, addr: SocketAddrV4) -> Result<(), ClientError> {
        self.request_status(Request::Bind {
            handle,
            ip: *addr.ip(),
            port: addr.port(),
        })
        .await
    }

    /// The backlog is not carried on the wire.
    pub async fn listen(&self, handle: SocketHandle, backlog: u32) -> Result<(), ClientError> {
        tracing::trace!("listen({}, backlog={})", handle, backlog);
        self.request_status(Request::Listen { handle }).await
    }

    /// Waits for a peer to connect and returns the peer's handle and virtual
    /// address.
    pub async fn accept(&self, handle: SocketHandle) -> Result<(SocketHandle, SocketAddrV4), ClientError> {
        match self.request(Request::Accept { handle }).await? {
            Response::Accepted { handle: peer, .. } if peer == INVALID_HANDLE => {
                Err(ClientError::AcceptFailed(handle))
            }
            Response::Accepted { handle: peer, ip, port } => Ok((peer, SocketAddrV4::new(ip, port))),
            _ => Err(vtcp_protocol::ProtocolError::UnexpectedResponse("expected accept").into()),
        }
    }

    /// Appends `data` to the entry's buffer. Returns the number of bytes
    /// framed, which is short when `data` exceeds the length field.
    pub async fn send(&self, handle: SocketHandle, data: &[u8]) -> Result<usize, ClientError> {
        self.ensure_running()?;
        let len = data.len().min(MAX_PAYLOAD_SIZE);
        let request = Request::Send {
            handle,
            payload: Bytes::copy_from_slice(&data[..len]),
        };
        self.conn.request(&request).await?;
        Ok(len)
    }

    /// Waits until `len` bytes are buffered on the entry and takes them.
    pub async fn recv(&self, handle: SocketHandle, len: usize) -> Result<Bytes, ClientError> {
        let len = len.min(MAX_PAYLOAD_SIZE) as u16;
        match self.request(Request::Recv { handle, len }).await? {
            Response::Data { status, payload } => {
                ClientError::check_status(status)?;
                Ok(payload)
            }
            _ => Err(vtcp_protocol::ProtocolError::UnexpectedResponse("expected data").into()),
        }
    }

    pub async fn close(&self, handle: SocketHandle) -> Result<(), ClientError> {
        self.ensure_running()?;
        self.conn.request(&Request::Close { handle }).await?;
        Ok(())
    }
}
