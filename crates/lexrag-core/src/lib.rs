//! # lexrag core
//!
//! Runtime-agnostic logic for lexrag: data models, character-window
//! chunking, the in-memory chunk store, lexical scoring, top-k retrieval,
//! and bounded prompt assembly.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. The calling
//! application owns extraction, generation, and transport.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Fixed-size overlapping character windows |
//! | [`store`] | Append-only chunk store and id allocation |
//! | [`score`] | Tokenization and lexical relevance scoring |
//! | [`search`] | Full-scan top-k retrieval |
//! | [`prompt`] | Context budget and prompt template |
//! | [`models`] | Documents, chunks, query results |
//! | [`error`] | Configuration errors |

pub mod chunk;
pub mod error;
pub mod models;
pub mod prompt;
pub mod score;
pub mod search;
pub mod store;
