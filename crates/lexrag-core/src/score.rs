//! Lexical relevance scoring.
//!
//! Text is normalized by lower-casing, dropping every character that is
//! neither alphanumeric nor whitespace, and splitting on whitespace. A query
//! becomes a set of distinct terms ([`QueryTerms`]); a chunk becomes a term
//! multiset ([`TermFrequencies`]).
//!
//! The raw score is the sum, over query terms present in the chunk, of the
//! term's frequency in the chunk. [`ScoringPolicy`] decides whether that sum
//! is used as-is or divided by the chunk's token count.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// How raw term-overlap counts are turned into a ranking score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Sum of matching term frequencies.
    #[default]
    Raw,
    /// Raw score divided by the chunk's token count, so long chunks are not
    /// favored just for being long.
    LengthNormalized,
}

impl fmt::Display for ScoringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringPolicy::Raw => write!(f, "raw"),
            ScoringPolicy::LengthNormalized => write!(f, "length_normalized"),
        }
    }
}

impl std::str::FromStr for ScoringPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(ScoringPolicy::Raw),
            "length_normalized" => Ok(ScoringPolicy::LengthNormalized),
            other => Err(format!(
                "unknown scoring policy '{}': use raw or length_normalized",
                other
            )),
        }
    }
}

/// Lower-case, strip punctuation, split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Distinct normalized terms of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTerms {
    terms: HashSet<String>,
}

impl QueryTerms {
    pub fn parse(query: &str) -> Self {
        Self {
            terms: tokenize(query).into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }
}

/// Token multiset of a chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFrequencies {
    counts: HashMap<String, u32>,
    total: usize,
}

impl TermFrequencies {
    pub fn from_text(text: &str) -> Self {
        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut total = 0usize;
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
            total += 1;
        }
        Self { counts, total }
    }

    /// Occurrences of `term` in the chunk.
    pub fn frequency(&self, term: &str) -> u32 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    /// Total token count (multiset size).
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Score a chunk's terms against a query. Never negative; exactly `0.0`
/// when no query term occurs in the chunk.
pub fn score(query: &QueryTerms, chunk: &TermFrequencies, policy: ScoringPolicy) -> f64 {
    let raw: u64 = query.iter().map(|t| u64::from(chunk.frequency(t))).sum();
    if raw == 0 {
        return 0.0;
    }
    match policy {
        ScoringPolicy::Raw => raw as f64,
        ScoringPolicy::LengthNormalized => raw as f64 / chunk.total() as f64,
    }
}
