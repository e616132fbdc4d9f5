//! Append-only journaled collection.
//!
//! Each document is one frame:
//!
//! ```text
//! ┌───────────┬─────────────┬─────────────┬──────────────┐
//! │ "PLJ1" 4B │ len u32 LE  │ crc32 u32 LE│ CBOR payload │
//! └───────────┴─────────────┴─────────────┴──────────────┘
//! ```
//!
//! The CRC covers the payload only. On open the journal is replayed into
//! memory; the first torn or corrupt frame and everything after it is
//! truncated away.

use crate::collection::{Collection, DocumentSet, Filter, FindOptions, InsertOneResult};
use crate::document::Document;
use crate::error::{StorageError, StorageResult};
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Frame magic.
pub const FRAME_MAGIC: [u8; 4] = *b"PLJ1";

/// Size of the frame header (magic + length + crc).
pub const FRAME_HEADER_SIZE: usize = 12;

/// Largest payload accepted on replay.
const MAX_FRAME_PAYLOAD: usize = 64 * 1024 * 1024;

/// Options for [`JournalCollection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalOptions {
    /// Call `sync_data` after every insert.
    pub sync_on_insert: bool,
    /// Replay without repairing the file and refuse inserts.
    pub read_only: bool,
}

/// The file a journal appends frames to.
trait JournalFile: Write + Send + fmt::Debug {
    fn sync(&mut self) -> io::Result<()>;

    fn position(&mut self) -> io::Result<u64>;

    /// Cuts the file back to `len` bytes and moves the cursor there.
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl JournalFile for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn position(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

/// A collection persisted to an append-only journal file.
///
/// All documents are also held in memory; reads never touch the file.
#[derive(Debug)]
pub struct JournalCollection<D> {
    name: String,
    path: PathBuf,
    options: JournalOptions,
    file: Mutex<Option<Box<dyn JournalFile>>>,
    documents: RwLock<DocumentSet<D>>,
}

impl<D: Document> JournalCollection<D> {
    /// Opens or creates `<dir>/<name>.journal` and replays it.
    ///
    /// With [`JournalOptions::read_only`] a missing journal reads as empty,
    /// nothing is created, and a torn tail is skipped but left in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be opened, or if
    /// the valid prefix of the journal cannot be rewritten.
    pub fn open(dir: &Path, name: &str, options: JournalOptions) -> StorageResult<Self> {
        let path = dir.join(format!("{name}.journal"));
        if options.read_only {
            return Self::open_read_only(name, path, options);
        }

        std::fs::create_dir_all(dir)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let replay = replay::<D>(&bytes);
        if let Some(reason) = &replay.stopped {
            tracing::warn!(
                journal = %path.display(),
                valid_bytes = replay.valid_len,
                dropped_bytes = bytes.len() - replay.valid_len,
                reason = %reason,
                "truncating journal tail"
            );
            file.set_len(replay.valid_len as u64)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::End(0))?;

        tracing::debug!(
            journal = %path.display(),
            documents = replay.documents.len(),
            "journal replayed"
        );

        Ok(Self::from_parts(
            name,
            path,
            options,
            Some(Box::new(file)),
            replay.documents,
        ))
    }

    fn open_read_only(name: &str, path: PathBuf, options: JournalOptions) -> StorageResult<Self> {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let replay = replay::<D>(&bytes);
        if let Some(reason) = &replay.stopped {
            tracing::debug!(
                journal = %path.display(),
                valid_bytes = replay.valid_len,
                reason = %reason,
                "ignoring journal tail"
            );
        }

        Ok(Self::from_parts(name, path, options, None, replay.documents))
    }

    fn from_parts(
        name: &str,
        path: PathBuf,
        options: JournalOptions,
        file: Option<Box<dyn JournalFile>>,
        documents: DocumentSet<D>,
    ) -> Self {
        Self {
            name: name.to_string(),
            path,
            options,
            file: Mutex::new(file),
            documents: RwLock::new(documents),
        }
    }

    /// Returns the path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if the journal holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, document: D) -> StorageResult<InsertOneResult> {
        let inserted_id = document.id();
        let frame = encode_frame(&document.encode());

        // The file lock orders appends so memory and journal agree.
        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            return Err(StorageError::NotWritable(self.name.clone()));
        };
        self.documents.read().ensure_absent(&inserted_id)?;

        let start = file.position()?;
        if let Err(err) = write_frame(&mut **file, &frame, self.options.sync_on_insert) {
            tracing::warn!(
                collection = %self.name,
                id = %inserted_id,
                error = %err,
                "journal write failed, rolling back"
            );
            if let Err(rollback) = file.truncate_to(start) {
                tracing::error!(
                    collection = %self.name,
                    offset = start,
                    error = %rollback,
                    "journal rollback failed, closing journal for writes"
                );
                *guard = None;
                return Err(rollback.into());
            }
            return Ok(InsertOneResult {
                acknowledged: false,
                inserted_id,
            });
        }

        self.documents.write().push(document);
        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id,
        })
    }
}

fn write_frame(file: &mut dyn JournalFile, frame: &[u8], sync: bool) -> io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    if sync {
        file.sync()?;
    }
    Ok(())
}

impl<D: Document> Collection<D> for JournalCollection<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn find<'a>(
        &'a self,
        filter: &'a Filter,
        options: FindOptions,
    ) -> BoxFuture<'a, StorageResult<Vec<D>>> {
        Box::pin(async move { Ok(self.documents.read().find(filter, options)) })
    }

    fn count_documents<'a>(&'a self, filter: &'a Filter) -> BoxFuture<'a, StorageResult<u64>> {
        Box::pin(async move { Ok(self.documents.read().count(filter)) })
    }

    fn insert_one(&self, document: D) -> BoxFuture<'_, StorageResult<InsertOneResult>> {
        Box::pin(async move { self.append(document) })
    }
}

/// Builds one journal frame around an encoded document.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&compute_crc32(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

struct Replay<D> {
    documents: DocumentSet<D>,
    valid_len: usize,
    stopped: Option<StorageError>,
}

fn replay<D: Document>(bytes: &[u8]) -> Replay<D> {
    let mut documents = DocumentSet::new();
    let mut offset = 0;

    while offset < bytes.len() {
        match read_frame::<D>(&bytes[offset..]) {
            Ok((document, consumed)) => {
                if documents.contains(&document.id()) {
                    return Replay {
                        documents,
                        valid_len: offset,
                        stopped: Some(StorageError::Corrupted(format!(
                            "duplicate id {} at offset {offset}",
                            document.id()
                        ))),
                    };
                }
                documents.push(document);
                offset += consumed;
            }
            Err(err) => {
                return Replay {
                    documents,
                    valid_len: offset,
                    stopped: Some(err),
                }
            }
        }
    }

    Replay {
        documents,
        valid_len: offset,
        stopped: None,
    }
}

fn read_frame<D: Document>(bytes: &[u8]) -> StorageResult<(D, usize)> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(StorageError::Corrupted("torn frame header".into()));
    }
    if bytes[0..4] != FRAME_MAGIC {
        return Err(StorageError::Corrupted("bad frame magic".into()));
    }

    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if len > MAX_FRAME_PAYLOAD {
        return Err(StorageError::Corrupted(format!("frame length {len} too large")));
    }

    let end = FRAME_HEADER_SIZE + len;
    let payload = bytes
        .get(FRAME_HEADER_SIZE..end)
        .ok_or_else(|| StorageError::Corrupted("torn frame payload".into()))?;
    if compute_crc32(payload) != crc {
        return Err(StorageError::Corrupted("checksum mismatch".into()));
    }

    Ok((D::decode(payload)?, end))
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}
