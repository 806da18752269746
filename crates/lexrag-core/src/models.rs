//! Core data models shared by ingestion and retrieval.
//!
//! Documents and chunks are immutable once created; the store hands out
//! `Arc<Chunk>` so that retrieval snapshots never copy chunk text.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::chunk::TextWindow;
use crate::score::TermFrequencies;

/// A single ingested unit of text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Opaque identifier (UUID v4).
    pub id: String,
    /// Display name, usually the uploaded file name.
    pub name: String,
    /// Declared content type at ingestion.
    pub content_type: String,
    /// Full extracted plain text.
    pub text: String,
    /// Length of `text` in characters.
    pub char_len: usize,
    /// SHA-256 of `text`. Diagnostic only; nothing is deduplicated.
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Build a document with a fresh id and the current timestamp.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, text: String) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let content_hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            content_type: content_type.into(),
            char_len: text.chars().count(),
            content_hash,
            text,
            ingested_at: Utc::now(),
        }
    }
}

/// The unit of retrieval: one window of a document's text.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// Store-wide id, strictly increasing in ingestion order.
    pub id: u64,
    pub document_id: String,
    pub text: String,
    /// Character offset of the first character (inclusive).
    pub start_offset: usize,
    /// Character offset past the last character (exclusive).
    pub end_offset: usize,
    /// Position within the owning document's chunk sequence.
    pub sequence_index: usize,
    #[serde(skip)]
    terms: TermFrequencies,
}

impl Chunk {
    /// Materialize a window as a chunk, tokenizing its text once.
    pub fn new(id: u64, document_id: &str, window: TextWindow, sequence_index: usize) -> Self {
        let terms = TermFrequencies::from_text(&window.text);
        Self::from_parts(id, document_id, window, sequence_index, terms)
    }

    /// Assemble a chunk from a window whose terms were already counted.
    pub fn from_parts(
        id: u64,
        document_id: &str,
        window: TextWindow,
        sequence_index: usize,
        terms: TermFrequencies,
    ) -> Self {
        Self {
            id,
            document_id: document_id.to_string(),
            text: window.text,
            start_offset: window.start_offset,
            end_offset: window.end_offset,
            sequence_index,
            terms,
        }
    }

    /// Token multiset of this chunk's text, used by the scorer.
    pub fn terms(&self) -> &TermFrequencies {
        &self.terms
    }
}

/// A chunk paired with its relevance score for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    pub score: f64,
}

/// Ranked retrieval output: descending score, ties by ascending chunk id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub hits: Vec<ScoredChunk>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }

    /// Chunk ids in ranked order.
    pub fn ids(&self) -> Vec<u64> {
        self.hits.iter().map(|h| h.chunk.id).collect()
    }
}
