//! # lexrag
//!
//! A small retrieval-augmented question answering service. Documents are
//! split into overlapping character windows, ranked against a question by
//! literal term overlap, and the best windows are handed to a local LLM as
//! context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Extract  │──▶│ Chunk+Store  │
//! │ txt/pdf… │   │  text    │   │  (in memory) │
//! └──────────┘   └──────────┘   └──────┬───────┘
//!                                      │
//!                   ┌──────────────────┤
//!                   ▼                  ▼
//!             ┌──────────┐       ┌───────────┐
//!             │ Retrieve │──────▶│ Generator │
//!             │ (top-k)  │       │ (Ollama)  │
//!             └──────────┘       └───────────┘
//! ```
//!
//! The retrieval primitives (chunking, scoring, the chunk store) live in the
//! runtime-free `lexrag-core` crate; this crate adds extraction, generation,
//! configuration, and the HTTP and CLI surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds surfaced by ingest and query |
//! | [`extract`] | Plain-text extraction from uploaded files |
//! | [`ingest`] | Ingestion pipeline |
//! | [`generator`] | Text-generation backends |
//! | [`rag`] | Retrieval-augmented answering |
//! | [`server`] | HTTP API |
//! | [`commands`] | One-shot CLI commands |

pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod generator;
pub mod ingest;
pub mod rag;
pub mod server;
