//! In-memory [`Store`] implementation.
//!
//! Documents and chunks live behind a single `std::sync::RwLock` so that an
//! ingest (allocate ids + append) is one critical section. Term counting
//! happens before the lock is taken. Readers clone the `Arc<Chunk>` handles
//! and release the lock before doing any scoring.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::chunk::TextWindow;
use crate::models::{Chunk, Document};
use crate::score::TermFrequencies;

use super::{AtomicIdAllocator, IdAllocator, Store};

#[derive(Default)]
struct Corpus {
    documents: HashMap<String, Document>,
    chunks: Vec<Arc<Chunk>>,
}

/// Process-lifetime chunk store.
pub struct InMemoryStore {
    corpus: RwLock<Corpus>,
    ids: Box<dyn IdAllocator>,
}

impl InMemoryStore {
    /// Empty store with an atomic id counter starting at 0.
    pub fn new() -> Self {
        Self::with_allocator(Box::new(AtomicIdAllocator::new()))
    }

    /// Empty store using the given id allocation strategy.
    pub fn with_allocator(ids: Box<dyn IdAllocator>) -> Self {
        Self {
            corpus: RwLock::new(Corpus::default()),
            ids,
        }
    }

    /// The id the next ingested chunk will receive.
    pub fn next_chunk_id(&self) -> u64 {
        self.ids.peek()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn ingest(&self, document: Document, windows: Vec<TextWindow>) -> usize {
        let count = windows.len();
        // Tokenize before locking; the write guard only covers id
        // allocation and the append.
        let prepared: Vec<(TextWindow, TermFrequencies)> = windows
            .into_iter()
            .map(|w| {
                let terms = TermFrequencies::from_text(&w.text);
                (w, terms)
            })
            .collect();

        let mut corpus = self.corpus.write().unwrap_or_else(PoisonError::into_inner);

        // Allocate under the write lock so store order and id order agree.
        let ids = self.ids.allocate(count);
        corpus.chunks.reserve(count);
        for (seq, (id, (window, terms))) in ids.zip(prepared).enumerate() {
            corpus.chunks.push(Arc::new(Chunk::from_parts(
                id,
                &document.id,
                window,
                seq,
                terms,
            )));
        }
        corpus.documents.insert(document.id.clone(), document);
        count
    }

    fn all_chunks(&self) -> Vec<Arc<Chunk>> {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .chunks
            .clone()
    }

    fn size(&self) -> usize {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .chunks
            .len()
    }

    fn document(&self, id: &str) -> Option<Document> {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .documents
            .get(id)
            .cloned()
    }

    fn document_count(&self) -> usize {
        self.corpus
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .documents
            .len()
    }
}
