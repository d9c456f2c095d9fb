//! TCP dispatcher.

use crate::config::Config;
use crate::error::ServerError;
use crate::handler::CommandHandler;
use crate::rendezvous::Rendezvous;
use crate::session::Session;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use vtcp_core::{SocketTable, DEFAULT_BUFFER_CAPACITY};
use vtcp_protocol::{Decoder, Encoder};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Interval between re-checks of a pending rendezvous or recv.
    pub poll_interval: Duration,
    /// Optional cap on how long a rendezvous or recv may wait.
    pub rendezvous_timeout: Option<Duration>,
    /// Per-socket buffer capacity in bytes. The table raises it to
    /// `MIN_BUFFER_CAPACITY` if smaller.
    pub buffer_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], vtcp_protocol::DEFAULT_PORT)),
            max_connections: 1000,
            poll_interval: Duration::from_millis(100),
            rendezvous_timeout: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds a server configuration from the loaded file/env config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            max_connections: config.network.max_connections,
            poll_interval: config.registry.poll_interval(),
            rendezvous_timeout: config.registry.rendezvous_timeout(),
            buffer_capacity: config.registry.buffer_capacity,
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the rendezvous timeout.
    pub fn with_rendezvous_timeout(mut self, timeout: Duration) -> Self {
        self.rendezvous_timeout = Some(timeout);
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server driving the virtual socket registry.
pub struct Server {
    config: ServerConfig,
    handler: Arc<CommandHandler>,
    table: Arc<SocketTable>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: Arc<AtomicBool>,
}

impl Server {
    /// Creates a new server with an empty socket table.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let running = Arc::new(AtomicBool::new(false));
        let table = Arc::new(SocketTable::with_buffer_capacity(config.buffer_capacity));
        let rendezvous = Rendezvous::new(
            config.poll_interval,
            config.rendezvous_timeout,
            running.clone(),
        );
        let handler = Arc::new(CommandHandler::new(table.clone(), rendezvous));

        Self {
            config,
            handler,
            table,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running,
        }
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        // Subscribe before flipping the flag so a shutdown racing startup is seen.
        let mut shutdown_rx = self.shutdown.subscribe();
        self.running.store(true, Ordering::SeqCst);

        let local_addr = listener.local_addr()?;
        tracing::info!("Registry listening on {}", local_addr);

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let running = self.running.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    handler,
                                    stats.clone(),
                                    running,
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    match e {
                                        ServerError::ShuttingDown => {
                                            tracing::debug!("Connection {} closed for shutdown", addr);
                                        }
                                        e => {
                                            tracing::warn!("Connection {} error: {}", addr, e);
                                            stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                        }
                                    }
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Registry shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Runs the worker loop for one transport connection.
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<CommandHandler>,
        stats: Arc<ServerStats>,
        running: Arc<AtomicBool>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let session = Session::new(addr);
        tracing::info!("Client connected: {} (session {})", addr, session.id);

        stream.set_nodelay(true)?;
        let mut decoder = Decoder::new();
        let mut buf = [0u8; 8192];

        loop {
            if !running.load(Ordering::SeqCst) {
                return Err(ServerError::ShuttingDown);
            }

            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!(
                                "[{}] Connection closed by client after {} requests ({:?})",
                                addr,
                                session.request_count(),
                                session.age()
                            );
                            // Trailing bytes that never formed a frame are a protocol error.
                            decoder.finish()?;
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::trace!("[{}] Received {} bytes", addr, n);
                            decoder.extend(&buf[..n]);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            loop {
                let request = match decoder.decode_request() {
                    Ok(Some(request)) => request,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("[{}] Protocol error, closing connection: {}", addr, e);
                        return Err(e.into());
                    }
                };

                session.record_request();
                stats.requests_total.fetch_add(1, Ordering::Relaxed);
                let opcode = request.opcode();

                if let Some(response) = handler.handle(&session, request, shutdown).await? {
                    let bytes = Encoder::encode_response(&response)?;
                    tracing::debug!("[{}] {} -> {} bytes", addr, opcode, bytes.len());
                    stream.write_all(&bytes).await?;
                }
            }
        }
    }

    /// Initiates server shutdown.
    ///
    /// Clears the running flag and wakes every worker and pending wait.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the shared running flag.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Returns the socket table.
    pub fn table(&self) -> &Arc<SocketTable> {
        &self.table
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
