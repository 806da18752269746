//! Storage abstraction for the chunk corpus.
//!
//! The [`Store`] trait is the only shared mutable resource in the system.
//! Retrieval works against any implementation through
//! [`all_chunks`](Store::all_chunks), which must return a consistent
//! snapshot without holding a lock after it returns.
//!
//! Chunk ids come from an injected [`IdAllocator`], so the counting strategy
//! can be swapped (atomic or lock-guarded) without touching the store.
//!
//! Implementations must be `Send + Sync` to be shared across request tasks.

pub mod memory;

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::chunk::TextWindow;
use crate::models::{Chunk, Document};

/// Append-only corpus of documents and their chunks.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ingest`](Store::ingest) | Take ownership of a document and append its chunks |
/// | [`all_chunks`](Store::all_chunks) | Snapshot every chunk in ingestion order |
/// | [`size`](Store::size) | Total chunk count |
/// | [`document`](Store::document) | Look up a document by id |
/// | [`document_count`](Store::document_count) | Number of documents ingested |
pub trait Store: Send + Sync {
    /// Store `document` and append one chunk per window, in window order.
    ///
    /// Returns the number of chunks appended. Ids are allocated as one
    /// contiguous block, so a document's chunks are never interleaved with
    /// another ingest's ids.
    fn ingest(&self, document: Document, windows: Vec<TextWindow>) -> usize;

    /// All chunks in ingestion order (document order, then sequence index).
    fn all_chunks(&self) -> Vec<Arc<Chunk>>;

    /// Total number of chunks.
    fn size(&self) -> usize;

    fn document(&self, id: &str) -> Option<Document>;

    fn document_count(&self) -> usize;
}

/// Strategy for handing out chunk ids.
///
/// Ids are never reused: every call returns a range that starts at or after
/// the end of every previously returned range.
pub trait IdAllocator: Send + Sync {
    /// Reserve `count` consecutive ids.
    fn allocate(&self, count: usize) -> Range<u64>;

    /// The id the next allocation will start at.
    fn peek(&self) -> u64;
}

/// Lock-free allocator backed by an [`AtomicU64`].
#[derive(Debug, Default)]
pub struct AtomicIdAllocator {
    next: AtomicU64,
}

impl AtomicIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdAllocator for AtomicIdAllocator {
    fn allocate(&self, count: usize) -> Range<u64> {
        let count = count as u64;
        let start = self.next.fetch_add(count, Ordering::SeqCst);
        start..start + count
    }

    fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Allocator that serializes allocation behind a [`Mutex`].
#[derive(Debug, Default)]
pub struct LockedIdAllocator {
    next: Mutex<u64>,
}

impl LockedIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdAllocator for LockedIdAllocator {
    fn allocate(&self, count: usize) -> Range<u64> {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let start = *next;
        *next += count as u64;
        start..*next
    }

    fn peek(&self) -> u64 {
        *self.next.lock().unwrap_or_else(|e| e.into_inner())
    }
}
