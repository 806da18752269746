//! Ingestion pipeline: bytes → text → windows → store.
//!
//! Every check that can fail (size limit, chunk geometry, type detection,
//! extraction) runs before the store is touched, so a failed ingest leaves
//! no partial state behind.

use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use lexrag_core::chunk::{chunk_text, ChunkParams};
use lexrag_core::models::Document;
use lexrag_core::store::Store;

use crate::config::Config;
use crate::error::RagError;
use crate::extract::{extract_text, DocumentType};

/// One uploaded file plus the window geometry to split it with.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub bytes: Vec<u8>,
    /// Declared MIME type, if the client sent one.
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub chunk_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub status: &'static str,
    pub document_id: String,
    pub chunks: usize,
    pub file_size_bytes: usize,
    /// Time spent extracting, chunking and indexing.
    pub embedding_time_ms: u64,
}

/// Extract, chunk and store one file.
pub fn ingest_document<S: Store + ?Sized>(
    store: &S,
    request: IngestRequest,
    max_file_bytes: usize,
) -> Result<IngestReport, RagError> {
    let started = Instant::now();
    let size = request.bytes.len();

    if size > max_file_bytes {
        return Err(RagError::FileTooLarge {
            size,
            limit: max_file_bytes,
        });
    }
    let params = ChunkParams::new(request.chunk_size, request.overlap)?;
    let doc_type = DocumentType::resolve(
        request.content_type.as_deref(),
        request.file_name.as_deref(),
    )?;

    let text = extract_text(&request.bytes, doc_type)?;
    let windows = chunk_text(&text, &params);

    let name = request
        .file_name
        .unwrap_or_else(|| "untitled".to_string());
    let document = Document::new(name, doc_type.mime(), text);
    let document_id = document.id.clone();
    let char_len = document.char_len;
    let chunks = store.ingest(document, windows);

    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        document_id = %document_id,
        content_type = doc_type.mime(),
        bytes = size,
        chars = char_len,
        chunks,
        elapsed_ms,
        "document ingested"
    );

    Ok(IngestReport {
        status: "success",
        document_id,
        chunks,
        file_size_bytes: size,
        embedding_time_ms: elapsed_ms,
    })
}

/// Read a file from disk and ingest it with the configured defaults.
pub fn ingest_path<S: Store + ?Sized>(
    store: &S,
    path: &Path,
    config: &Config,
) -> anyhow::Result<IngestReport> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let request = IngestRequest {
        bytes,
        content_type: None,
        file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        chunk_size: config.chunking.chunk_size,
        overlap: config.chunking.overlap,
    };
    Ok(ingest_document(store, request, config.ingest.max_file_bytes)?)
}

/// Ingest `ingest.sample_document` at startup, if configured.
///
/// Failures are logged and otherwise ignored; the service starts with an
/// empty store instead.
pub fn load_sample_document<S: Store + ?Sized>(store: &S, config: &Config) -> Option<IngestReport> {
    let path = config.ingest.sample_document.as_deref()?;
    if !path.exists() {
        tracing::warn!(path = %path.display(), "sample document not found, skipping");
        return None;
    }
    match ingest_path(store, path, config) {
        Ok(report) => {
            tracing::info!(
                path = %path.display(),
                chunks = report.chunks,
                "loaded sample document"
            );
            Some(report)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load sample document");
            None
        }
    }
}
