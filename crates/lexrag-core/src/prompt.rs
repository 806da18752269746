//! Bounded context assembly and the answer prompt template.
//!
//! Retrieved chunks are concatenated in ranked order, separated by a blank
//! line, until `max_chars` characters are used. The chunk that crosses the
//! budget is cut to fit instead of being dropped. Separators count toward
//! the budget.

use crate::models::QueryResult;

const SEPARATOR: &str = "\n\n";

/// Context text plus how many ranked chunks contributed to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Context {
    pub text: String,
    /// Chunks included whole or in part.
    pub chunks_used: usize,
    /// Whether the last included chunk was cut short.
    pub truncated: bool,
}

/// Greedily pack ranked chunk texts into at most `max_chars` characters.
pub fn build_context(result: &QueryResult, max_chars: usize) -> Context {
    let sep_len = SEPARATOR.chars().count();
    let mut ctx = Context::default();
    let mut used = 0usize;

    for hit in result.iter() {
        let mut remaining = max_chars - used;
        if ctx.chunks_used > 0 {
            if remaining <= sep_len {
                break;
            }
            ctx.text.push_str(SEPARATOR);
            used += sep_len;
            remaining -= sep_len;
        }
        if remaining == 0 {
            break;
        }

        let chunk_len = hit.chunk.end_offset - hit.chunk.start_offset;
        if chunk_len <= remaining {
            ctx.text.push_str(&hit.chunk.text);
            used += chunk_len;
            ctx.chunks_used += 1;
        } else {
            ctx.text.extend(hit.chunk.text.chars().take(remaining));
            ctx.chunks_used += 1;
            ctx.truncated = true;
            break;
        }
    }

    ctx
}

/// Render the fixed answer prompt.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a careful assistant. Answer the question using only the provided context. \
         If the context does not contain the answer, say that you do not know.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        context,
        question.trim()
    )
}
