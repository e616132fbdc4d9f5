//! # pagelog Storage
//!
//! Typed document collections for pagelog.
//!
//! A [`Collection`] stores [`Document`]s and answers filtered, sorted and
//! windowed queries. Writes report whether the backend acknowledged them.
//!
//! ## Available Collections
//!
//! - [`MemoryCollection`] - For testing and ephemeral servers
//! - [`JournalCollection`] - Append-only, CRC-framed file that is replayed on open
//!
//! A writing process holds a [`DirLock`] on the journal directory. Other
//! processes may still open the journals read-only.
//!
//! ## Design Principles
//!
//! - Collections are object-safe and async (`BoxFuture`), so callers hold
//!   `Arc<dyn Collection<D>>` and never know which backend they talk to
//! - Documents own their encoding; storage only frames and checksums bytes
//! - Must be `Send + Sync` for concurrent access

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod collection;
pub mod document;
mod error;
mod id;
mod journal;
mod lock;
mod memory;

pub use collection::{Collection, Filter, FindOptions, InsertOneResult, Sort};
pub use document::Document;
pub use error::{StorageError, StorageResult};
pub use id::{ObjectId, ParseObjectIdError, Timestamp, OBJECT_ID_LEN};
pub use journal::{compute_crc32, encode_frame, JournalCollection, JournalOptions, FRAME_MAGIC};
pub use lock::DirLock;
pub use memory::MemoryCollection;
