//! Connection management.

use crate::error::ClientError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use vtcp_protocol::{Decoder, Encoder, Request, Response, ResponseShape};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Registry address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout. Unset means accept, connect and recv may block
    /// indefinitely, like their socket counterparts.
    pub request_timeout: Option<Duration>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], vtcp_protocol::DEFAULT_PORT)))
    }
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

/// A transport connection to the registry.
///
/// Requests are strictly serialized: the registry answers frames in order and
/// responses carry no correlation id.
pub struct Connection {
    config: ConnectionConfig,
    stream: Mutex<Option<TcpStream>>,
    decoder: Mutex<Decoder>,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
            decoder: Mutex::new(Decoder::new()),
            connected: AtomicBool::new(false),
        }
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the registry.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();

        *self.stream.lock().await = Some(stream);
        self.decoder.lock().await.clear();
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    /// Sends a request and, if the opcode has one, waits for its response.
    pub async fn request(&self, request: &Request) -> Result<Option<Response>, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let encoded = Encoder::encode_request(request)?;
        let shape = request.response_shape();

        let mut stream_guard = self.stream.lock().await;
        let stream = stream_guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = match self.config.request_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.exchange(stream, &encoded, shape)).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Timeout),
                }
            }
            None => self.exchange(stream, &encoded, shape).await,
        };

        if let Err(ref e) = result {
            // A partial exchange leaves the stream out of frame.
            tracing::debug!("{} failed, dropping connection: {}", request.opcode(), e);
            stream_guard.take();
            self.connected.store(false, Ordering::SeqCst);
        }

        result
    }

    async fn exchange(
        &self,
        stream: &mut TcpStream,
        encoded: &[u8],
        shape: Option<ResponseShape>,
    ) -> Result<Option<Response>, ClientError> {
        stream.write_all(encoded).await?;

        let Some(shape) = shape else {
            return Ok(None);
        };

        let mut decoder = self.decoder.lock().await;
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            if let Some(response) = decoder.decode_response(shape)? {
                return Ok(Some(response));
            }

            let n = stream.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!("Connection closed by registry");
                return Err(ClientError::ConnectionClosed);
            }
            decoder.extend(&buf[..n]);
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut stream) = self.stream.lock().await.take() {
            let _ = stream.shutdown().await;
        }
        self.decoder.lock().await.clear();

        tracing::debug!("Connection closed");
        Ok(())
    }
}
