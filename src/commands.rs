//! One-shot CLI commands.
//!
//! Each command builds a fresh in-memory store from the files given on the
//! command line; nothing persists between invocations.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lexrag_core::chunk::chunk_text;
use lexrag_core::score::ScoringPolicy;
use lexrag_core::store::memory::InMemoryStore;
use lexrag_core::store::Store;

use crate::config::Config;
use crate::extract::{extract_text, DocumentType};
use crate::generator::{create_generator, DisabledGenerator, Generator};
use crate::ingest::ingest_path;
use crate::rag::{QueryRequest, RagEngine, RagSettings};

/// Print the windows a file would be split into.
pub fn run_chunk(
    config: &Config,
    file: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let mut chunking = config.chunking.clone();
    if let Some(size) = chunk_size {
        chunking.chunk_size = size;
    }
    if let Some(o) = overlap {
        chunking.overlap = o;
    }
    let params = chunking.params()?;

    let name = file.file_name().map(|n| n.to_string_lossy().into_owned());
    let doc_type = DocumentType::resolve(None, name.as_deref())?;
    let bytes = std::fs::read(file)?;
    let text = extract_text(&bytes, doc_type)?;
    let windows = chunk_text(&text, &params);

    println!(
        "{}: {} chars → {} chunks (size {}, overlap {})",
        file.display(),
        text.chars().count(),
        windows.len(),
        params.chunk_size(),
        params.overlap()
    );
    for (i, w) in windows.iter().enumerate() {
        println!("{}. [{}..{})", i, w.start_offset, w.end_offset);
        println!("    \"{}\"", preview(&w.text, 80));
    }
    Ok(())
}

/// Rank chunks from `files` against `query`.
pub fn run_search(
    config: &Config,
    query: &str,
    files: &[PathBuf],
    top_k: Option<usize>,
    scoring: Option<ScoringPolicy>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    let store = load_files(config, files)?;
    let engine = RagEngine::new(
        store,
        Arc::new(DisabledGenerator),
        settings_with(config, scoring),
    );
    let result = engine.search(query, top_k.unwrap_or(config.retrieval.default_top_k))?;

    if result.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in result.iter().enumerate() {
        let (doc_name, ingested) = engine
            .store()
            .document(&hit.chunk.document_id)
            .map(|d| (d.name, d.ingested_at.format("%Y-%m-%d %H:%M").to_string()))
            .unwrap_or_default();
        println!(
            "{}. [{:.2}] {} #{}",
            i + 1,
            hit.score,
            doc_name,
            hit.chunk.sequence_index
        );
        println!("    ingested: {}", ingested);
        println!("    offsets: {}..{}", hit.chunk.start_offset, hit.chunk.end_offset);
        println!("    excerpt: \"{}\"", preview(&hit.chunk.text, 120));
        println!("    id: {}", hit.chunk.id);
        println!();
    }
    Ok(())
}

/// Answer `question` from `files` using the configured generator.
pub async fn run_ask(
    config: &Config,
    question: &str,
    files: &[PathBuf],
    top_k: Option<usize>,
    temperature: f64,
    scoring: Option<ScoringPolicy>,
) -> Result<()> {
    let store = load_files(config, files)?;
    let generator: Arc<dyn Generator> = Arc::from(create_generator(&config.generator)?);
    let engine = RagEngine::new(store, generator, settings_with(config, scoring));

    let request = QueryRequest::new(
        question,
        top_k.unwrap_or(config.retrieval.default_top_k),
        temperature,
        config.retrieval.max_top_k,
    )?;
    let answer = engine.answer(&request).await?;

    println!("{}", answer.answer.trim());
    println!();
    println!(
        "-- {} | {} context chunks | {} ms",
        answer.model, answer.context_chunks, answer.inference_time_ms
    );
    Ok(())
}

/// `--scoring` overrides `[retrieval].scoring`.
fn settings_with(config: &Config, scoring: Option<ScoringPolicy>) -> RagSettings {
    let mut settings = RagSettings::from_config(config);
    if let Some(policy) = scoring {
        settings.scoring = policy;
    }
    settings
}

fn load_files(config: &Config, files: &[PathBuf]) -> Result<Arc<dyn Store>> {
    if files.is_empty() {
        bail!("at least one --file is required");
    }
    let store = InMemoryStore::new();
    for file in files {
        let report = ingest_path(&store, file, config)?;
        tracing::debug!(file = %file.display(), chunks = report.chunks, "loaded file");
    }
    Ok(Arc::new(store))
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        flat.to_string()
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
