//! Socket table - the registry of virtual sockets.
//!
//! Entries are appended and never removed, so a handle stays valid for the
//! lifetime of the table. Growth takes the table's write lock; everything
//! else clones the entry out under the read lock and works on the entry's
//! own lock.

use crate::buffer::{DEFAULT_BUFFER_CAPACITY, MIN_BUFFER_CAPACITY};
use crate::error::CoreError;
use crate::socket::{lock_both, PeerInfo, SocketStatus, VirtualSocket};
use crate::SocketHandle;
use bytes::Bytes;
use parking_lot::RwLock;
use std::net::Ipv4Addr;
use std::sync::Arc;
use vtcp_protocol::INVALID_HANDLE;

/// Upper bound on the number of entries. Handles stay below the
/// `INVALID_HANDLE` sentinel.
pub const MAX_SOCKETS: usize = INVALID_HANDLE as usize;

/// Append-only table of virtual sockets.
pub struct SocketTable {
    entries: RwLock<Vec<Arc<VirtualSocket>>>,
    buffer_capacity: usize,
    max_sockets: usize,
}

impl SocketTable {
    pub fn new() -> Self {
        Self::with_buffer_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates a table whose entries get buffers of the given capacity,
    /// raised to `MIN_BUFFER_CAPACITY` if smaller.
    pub fn with_buffer_capacity(buffer_capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            buffer_capacity: buffer_capacity.max(MIN_BUFFER_CAPACITY),
            max_sockets: MAX_SOCKETS,
        }
    }

    /// Caps the number of entries, never above `MAX_SOCKETS`.
    pub fn with_max_sockets(mut self, max_sockets: usize) -> Self {
        self.max_sockets = max_sockets.min(MAX_SOCKETS);
        self
    }

    /// Adds a VOID entry for the given address and returns its handle.
    pub fn create(&self, ip: Ipv4Addr, port: u16) -> Result<SocketHandle, CoreError> {
        let mut entries = self.entries.write();
        let full = CoreError::TableFull {
            max: self.max_sockets,
        };
        if entries.len() >= self.max_sockets {
            return Err(full);
        }
        let handle = SocketHandle::try_from(entries.len()).map_err(|_| full)?;
        entries.push(Arc::new(VirtualSocket::new(
            handle,
            ip,
            port,
            self.buffer_capacity,
        )));
        tracing::debug!("Created socket {} for {}:{}", handle, ip, port);
        Ok(handle)
    }

    /// Looks up an entry by handle.
    pub fn get(&self, handle: SocketHandle) -> Result<Arc<VirtualSocket>, CoreError> {
        let entries = self.entries.read();
        entries
            .get(handle as usize)
            .cloned()
            .ok_or(CoreError::InvalidHandle {
                handle,
                len: entries.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Returns the current status of an entry.
    pub fn status(&self, handle: SocketHandle) -> Result<SocketStatus, CoreError> {
        Ok(self.get(handle)?.status())
    }

    /// Returns the current partner of an entry.
    pub fn partner(&self, handle: SocketHandle) -> Result<Option<SocketHandle>, CoreError> {
        Ok(self.get(handle)?.partner())
    }

    /// Validates the handle. The requested address is not recorded and does
    /// not restrict which peers may connect.
    pub fn bind(&self, handle: SocketHandle, ip: Ipv4Addr, port: u16) -> Result<(), CoreError> {
        self.get(handle)?;
        tracing::debug!("Bind {} to {}:{} (address not enforced)", handle, ip, port);
        Ok(())
    }

    /// Validates the handle. Listening does not change the entry's status;
    /// an entry becomes connectable only once accept runs.
    pub fn listen(&self, handle: SocketHandle, backlog: u32) -> Result<(), CoreError> {
        self.get(handle)?;
        tracing::debug!("Listen on {} (backlog {} ignored)", handle, backlog);
        Ok(())
    }

    /// Marks the entry as awaiting a peer.
    pub fn begin_accept(&self, handle: SocketHandle) -> Result<(), CoreError> {
        let entry = self.get(handle)?;
        let mut state = entry.lock();
        if let (SocketStatus::Connected, Some(partner)) = (state.status, state.partner) {
            return Err(CoreError::AlreadyConnected { handle, partner });
        }
        state.status = SocketStatus::Initial;
        Ok(())
    }

    /// Returns the peer once some connect has paired with this entry.
    pub fn poll_accept(&self, handle: SocketHandle) -> Result<Option<PeerInfo>, CoreError> {
        let entry = self.get(handle)?;
        let partner = {
            let state = entry.lock();
            match (state.status, state.partner) {
                (SocketStatus::Connected, Some(partner)) => partner,
                _ => return Ok(None),
            }
        };

        let peer = self.get(partner)?;
        Ok(Some(PeerInfo {
            handle: peer.handle(),
            ip: peer.ip(),
            port: peer.port(),
        }))
    }

    /// Attempts one rendezvous pass for a connect from `handle` to
    /// `ip:port`.
    ///
    /// Scans for another entry with that address in INITIAL status and pairs
    /// the two under both entry locks. Returns `Ok(None)` when no entry is
    /// awaiting yet.
    pub fn try_connect(
        &self,
        handle: SocketHandle,
        ip: Ipv4Addr,
        port: u16,
    ) -> Result<Option<PeerInfo>, CoreError> {
        let me = self.get(handle)?;
        let candidates: Vec<Arc<VirtualSocket>> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.handle() != handle && e.matches(ip, port))
            .cloned()
            .collect();

        for candidate in candidates {
            let (mut mine, mut theirs) = lock_both(&me, &candidate);

            if let (SocketStatus::Connected, Some(partner)) = (mine.status, mine.partner) {
                return Err(CoreError::AlreadyConnected { handle, partner });
            }
            if theirs.status != SocketStatus::Initial {
                continue;
            }

            mine.pair_with(candidate.handle());
            theirs.pair_with(handle);
            tracing::debug!("Paired {} with {} ({}:{})", handle, candidate.handle(), ip, port);

            return Ok(Some(PeerInfo {
                handle: candidate.handle(),
                ip: candidate.ip(),
                port: candidate.port(),
            }));
        }

        Ok(None)
    }

    /// Appends data to the entry's buffer and returns how many bytes were
    /// kept; the rest is dropped.
    pub fn send(&self, handle: SocketHandle, data: &[u8]) -> Result<usize, CoreError> {
        let accepted = self.get(handle)?.write(data);
        if accepted < data.len() {
            tracing::debug!(
                "Buffer of {} full, dropped {} of {} bytes",
                handle,
                data.len() - accepted,
                data.len()
            );
        }
        Ok(accepted)
    }

    /// Takes exactly `len` bytes from the entry's buffer if available.
    pub fn try_recv(&self, handle: SocketHandle, len: usize) -> Result<Option<Bytes>, CoreError> {
        Ok(self.get(handle)?.read(len))
    }

    /// Closes an entry.
    ///
    /// A paired entry and its partner are both reset to INITIAL with empty
    /// buffers and no partner. An unpaired entry is withdrawn to VOID so it
    /// can no longer be matched by a connect. Returns the former partner.
    pub fn close(&self, handle: SocketHandle) -> Result<Option<SocketHandle>, CoreError> {
        let me = self.get(handle)?;

        loop {
            match me.partner() {
                None => {
                    let mut state = me.lock();
                    if state.partner.is_some() {
                        // Paired since we looked; retry with both locks.
                        continue;
                    }
                    state.status = SocketStatus::Void;
                    state.buffer.clear();
                    return Ok(None);
                }
                Some(partner) => {
                    let other = self.get(partner)?;
                    let (mut mine, mut theirs) = lock_both(&me, &other);
                    if mine.partner != Some(partner) {
                        continue;
                    }
                    mine.reset();
                    if theirs.partner == Some(handle) {
                        theirs.reset();
                    }
                    tracing::debug!("Closed {} and its partner {}", handle, partner);
                    return Ok(Some(partner));
                }
            }
        }
    }
}

impl Default for SocketTable {
    fn default() -> Self {
        Self::new()
    }
}
