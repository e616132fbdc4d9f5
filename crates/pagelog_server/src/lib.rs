//! # pagelog Server
//!
//! WebSocket front end for the pagelog stores.
//!
//! This crate provides:
//! - A listener that upgrades TCP connections to WebSockets
//! - A [`Multiplexer`] mapping connections to logical [`Session`]s
//! - Per-session duplicate suppression and delivery queues
//! - The mapping between stored values and their wire form
//!
//! # Sessions
//!
//! A client names its session in every frame. When a connection drops and
//! the client reconnects, the next frame rebinds the session to the new
//! connection, and results that completed in between are delivered in
//! order. Request ids already seen by the session are not executed again.
//!
//! # Example
//!
//! ```rust,ignore
//! use pagelog_core::{StoreConfig, Stores};
//! use pagelog_server::{PagelogServer, ServerConfig, ServerContext};
//!
//! let stores = Stores::open(&StoreConfig::new().data_dir("/var/lib/pagelog"))?;
//! let context = ServerContext::new(ServerConfig::default(), stores);
//! PagelogServer::new(context).run().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod context;
pub mod convert;
mod error;
mod multiplexer;
mod server;
mod session;
mod transport;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use context::ServerContext;
pub use error::{ServerError, ServerResult};
pub use multiplexer::Multiplexer;
pub use server::PagelogServer;
pub use session::Session;
pub use transport::{
    ChannelTransport, Frame, MemoryTransport, OutboundQueue, SendStatus, Transport, TransportId,
};
