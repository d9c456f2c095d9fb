//! Opcode handlers.

use crate::error::ServerError;
use crate::rendezvous::Rendezvous;
use crate::session::Session;
use bytes::Bytes;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::broadcast;
use vtcp_core::{PeerInfo, SocketTable};
use vtcp_protocol::{Request, Response, SocketHandle, StatusCode, INVALID_HANDLE};

/// Executes decoded requests against the socket table.
pub struct CommandHandler {
    table: Arc<SocketTable>,
    rendezvous: Rendezvous,
}

impl CommandHandler {
    /// Creates a new command handler.
    pub fn new(table: Arc<SocketTable>, rendezvous: Rendezvous) -> Self {
        Self { table, rendezvous }
    }

    /// Returns the socket table.
    pub fn table(&self) -> &Arc<SocketTable> {
        &self.table
    }

    /// Handles one request and returns the response frame to send, if the
    /// opcode has one.
    ///
    /// Registry errors are reported in the response. Only shutdown, I/O and
    /// protocol errors are returned as `Err`.
    pub async fn handle(
        &self,
        session: &Session,
        request: Request,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<Option<Response>, ServerError> {
        tracing::debug!(
            "[{}] {} handle={:?}",
            session.remote_addr,
            request.opcode(),
            request.handle()
        );

        match request {
            Request::Socket { ip, port } => match self.table.create(ip, port) {
                Ok(handle) => Ok(Some(Response::Handle(handle))),
                Err(e) => {
                    tracing::warn!("[{}] SOCKET for {}:{} failed: {}", session.remote_addr, ip, port, e);
                    Ok(Some(Response::Handle(INVALID_HANDLE)))
                }
            },
            Request::Connect { handle, ip, port } => {
                let result = self.handle_connect(handle, ip, port, shutdown).await;
                status_response(result.map(|_| ()))
            }
            Request::Bind { handle, ip, port } => {
                status_response(self.table.bind(handle, ip, port).map_err(Into::into))
            }
            Request::Listen { handle } => {
                // The frame carries no backlog.
                status_response(self.table.listen(handle, 0).map_err(Into::into))
            }
            Request::Accept { handle } => {
                match self.handle_accept(handle, shutdown).await {
                    Ok(peer) => Ok(Some(Response::Accepted {
                        handle: peer.handle,
                        ip: peer.ip,
                        port: peer.port,
                    })),
                    Err(e) if e.status_code().is_some() => {
                        tracing::warn!("[{}] ACCEPT on {} failed: {}", session.remote_addr, handle, e);
                        Ok(Some(Response::Accepted {
                            handle: INVALID_HANDLE,
                            ip: Ipv4Addr::UNSPECIFIED,
                            port: 0,
                        }))
                    }
                    Err(e) => Err(e),
                }
            }
            Request::Send { handle, payload } => {
                if let Err(e) = self.handle_send(handle, &payload) {
                    tracing::warn!("[{}] SEND on {} dropped: {}", session.remote_addr, handle, e);
                }
                Ok(None)
            }
            Request::Recv { handle, len } => match self.handle_recv(handle, len, shutdown).await {
                Ok(payload) => Ok(Some(Response::data(payload))),
                Err(e) => match e.status_code() {
                    Some(code) => {
                        tracing::warn!("[{}] RECV on {} failed: {}", session.remote_addr, handle, e);
                        // Keep the frame length the client expects.
                        Ok(Some(Response::Data {
                            status: code.as_u16(),
                            payload: Bytes::from(vec![0u8; len as usize]),
                        }))
                    }
                    None => Err(e),
                },
            },
            Request::Close { handle } => {
                if let Err(e) = self.handle_close(handle) {
                    tracing::warn!("[{}] CLOSE on {} ignored: {}", session.remote_addr, handle, e);
                }
                Ok(None)
            }
        }
    }

    /// Waits for an entry at `ip:port` to be awaiting in accept, then pairs
    /// with it.
    async fn handle_connect(
        &self,
        handle: SocketHandle,
        ip: Ipv4Addr,
        port: u16,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<PeerInfo, ServerError> {
        let table = &self.table;
        let peer = self
            .rendezvous
            .wait_for(shutdown, || table.try_connect(handle, ip, port))
            .await?;
        self.rendezvous.notify();
        tracing::info!("Socket {} connected to {} ({})", handle, peer.handle, peer.addr());
        Ok(peer)
    }

    /// Puts the entry into the awaiting state and waits for a connect to pair
    /// with it.
    async fn handle_accept(
        &self,
        handle: SocketHandle,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<PeerInfo, ServerError> {
        self.table.begin_accept(handle)?;
        self.rendezvous.notify();

        let table = &self.table;
        let peer = self
            .rendezvous
            .wait_for(shutdown, || table.poll_accept(handle))
            .await?;
        tracing::info!("Socket {} accepted {} ({})", handle, peer.handle, peer.addr());
        Ok(peer)
    }

    fn handle_send(&self, handle: SocketHandle, payload: &[u8]) -> Result<usize, ServerError> {
        let accepted = self.table.send(handle, payload)?;
        self.rendezvous.notify();
        Ok(accepted)
    }

    /// Waits until the entry's buffer holds `len` bytes and takes them.
    async fn handle_recv(
        &self,
        handle: SocketHandle,
        len: u16,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<Bytes, ServerError> {
        let table = &self.table;
        self.rendezvous
            .wait_for(shutdown, || table.try_recv(handle, len as usize))
            .await
    }

    fn handle_close(&self, handle: SocketHandle) -> Result<(), ServerError> {
        let partner = self.table.close(handle)?;
        self.rendezvous.notify();
        match partner {
            Some(partner) => tracing::info!("Socket {} closed (partner {} reset)", handle, partner),
            None => tracing::info!("Socket {} closed", handle),
        }
        Ok(())
    }
}

/// Turns a handler result into a status frame, passing through errors that
/// end the connection.
fn status_response(result: Result<(), ServerError>) -> Result<Option<Response>, ServerError> {
    match result {
        Ok(()) => Ok(Some(Response::status(StatusCode::Ok))),
        Err(e) => match e.status_code() {
            Some(code) => {
                tracing::debug!("Replying {} ({})", code, e);
                Ok(Some(Response::status(code)))
            }
            None => Err(e),
        },
    }
}
