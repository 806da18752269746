//! Top-k lexical retrieval over a [`Store`].
//!
//! The retriever has no index: every query scores every chunk of one store
//! snapshot. At the target corpus size (a few thousand chunks) this full
//! scan plus sort is the hot path and is cheap enough.
//!
//! # Ranking
//!
//! 1. Normalize the query into distinct terms once.
//! 2. Score every chunk with [`score`](crate::score::score) under the
//!    configured [`ScoringPolicy`].
//! 3. Sort by score (desc), then chunk id (asc) so ties always favor the
//!    earliest-ingested chunk.
//! 4. Truncate to `top_k`.
//!
//! Zero-score chunks are not filtered out. A query that matches nothing
//! still returns the first `top_k` chunks in id order.

use crate::error::ConfigError;
use crate::models::{QueryResult, ScoredChunk};
use crate::score::{score, QueryTerms, ScoringPolicy};
use crate::store::Store;

/// Retrieval tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieveParams {
    top_k: usize,
    pub policy: ScoringPolicy,
}

impl RetrieveParams {
    /// Rejects `top_k == 0`.
    pub fn new(top_k: usize, policy: ScoringPolicy) -> Result<Self, ConfigError> {
        if top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        Ok(Self { top_k, policy })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

/// Rank every chunk in `store` against `query` and keep the best `top_k`.
///
/// Returns an empty result for an empty store. Never returns more than
/// `top_k` hits or more hits than the store holds.
pub fn retrieve<S: Store + ?Sized>(store: &S, query: &str, params: &RetrieveParams) -> QueryResult {
    let terms = QueryTerms::parse(query);
    let chunks = store.all_chunks();
    if chunks.is_empty() {
        return QueryResult::default();
    }

    let mut hits: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let score = score(&terms, chunk.terms(), params.policy);
            ScoredChunk { chunk, score }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.chunk.id.cmp(&b.chunk.id))
    });
    hits.truncate(params.top_k);

    QueryResult { hits }
}
