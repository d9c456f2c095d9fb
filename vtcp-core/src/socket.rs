//! Virtual socket entries.

use crate::buffer::SocketBuffer;
use crate::SocketHandle;
use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use std::net::{Ipv4Addr, SocketAddrV4};

/// Connection status of a virtual socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketStatus {
    /// Freshly created, no role yet.
    #[default]
    Void,
    /// Waiting in accept for a peer to connect.
    Initial,
    /// Paired with a partner.
    Connected,
}

/// The peer resolved by a completed rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub handle: SocketHandle,
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl PeerInfo {
    pub fn addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }
}

/// Mutable part of an entry, guarded by the entry's lock.
#[derive(Debug)]
pub(crate) struct SocketState {
    pub(crate) status: SocketStatus,
    pub(crate) partner: Option<SocketHandle>,
    pub(crate) buffer: SocketBuffer,
}

impl SocketState {
    pub(crate) fn pair_with(&mut self, partner: SocketHandle) {
        self.partner = Some(partner);
        self.status = SocketStatus::Connected;
    }

    /// Tears down a connection: back to awaiting, no partner, empty buffer.
    pub(crate) fn reset(&mut self) {
        self.status = SocketStatus::Initial;
        self.partner = None;
        self.buffer.clear();
    }
}

/// One row of the socket table.
///
/// The address is fixed at creation; status, partner and buffer change under
/// the entry's own lock.
#[derive(Debug)]
pub struct VirtualSocket {
    handle: SocketHandle,
    ip: Ipv4Addr,
    port: u16,
    state: Mutex<SocketState>,
}

impl VirtualSocket {
    pub fn new(handle: SocketHandle, ip: Ipv4Addr, port: u16, buffer_capacity: usize) -> Self {
        Self {
            handle,
            ip,
            port,
            state: Mutex::new(SocketState {
                status: SocketStatus::Void,
                partner: None,
                buffer: SocketBuffer::with_capacity(buffer_capacity),
            }),
        }
    }

    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }

    pub fn matches(&self, ip: Ipv4Addr, port: u16) -> bool {
        self.ip == ip && self.port == port
    }

    pub fn status(&self) -> SocketStatus {
        self.state.lock().status
    }

    pub fn partner(&self) -> Option<SocketHandle> {
        self.state.lock().partner
    }

    /// Number of bytes waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Appends to the buffer, returning how many bytes were kept.
    pub fn write(&self, bytes: &[u8]) -> usize {
        self.state.lock().buffer.write(bytes)
    }

    /// Takes exactly `len` bytes from the buffer if that many are present.
    pub fn read(&self, len: usize) -> Option<Bytes> {
        self.state.lock().buffer.read(len)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SocketState> {
        self.state.lock()
    }
}

/// Locks two distinct entries, lower handle first, and returns the guards in
/// argument order.
pub(crate) fn lock_both<'a>(
    a: &'a VirtualSocket,
    b: &'a VirtualSocket,
) -> (MutexGuard<'a, SocketState>, MutexGuard<'a, SocketState>) {
    debug_assert_ne!(a.handle, b.handle);
    if a.handle < b.handle {
        let first = a.lock();
        let second = b.lock();
        (first, second)
    } else {
        let second = b.lock();
        let first = a.lock();
        (first, second)
    }
}
