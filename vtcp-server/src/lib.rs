//! # vtcp-server
//!
//! Registry server for vtcp.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Opcode framing and dispatch
//! - Session tracking
//! - Connect/accept rendezvous and blocking receives
//! - YAML and environment configuration

pub mod config;
pub mod error;
pub mod handler;
pub mod rendezvous;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, NetworkConfig, RegistryConfig};
pub use error::ServerError;
pub use handler::CommandHandler;
pub use rendezvous::Rendezvous;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::Session;
