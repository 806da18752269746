//! Retrieval-augmented answering.
//!
//! [`RagEngine::answer`] runs the query pipeline:
//!
//! 1. Retrieve the top-k chunks from one store snapshot (the store lock is
//!    released before anything else happens).
//! 2. Pack them into a context bounded by `max_context_chars`.
//! 3. Render the fixed prompt.
//! 4. Call the generator with a hard per-attempt timeout, retrying timeouts
//!    and transient backend failures up to `max_retries` extra times.
//! 5. Wrap the output into a [`RagAnswer`].
//!
//! Queries never write state, so dropping the `answer` future at any point
//! (client disconnect, request deadline) simply abandons the in-flight call.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lexrag_core::error::ConfigError;
use lexrag_core::models::QueryResult;
use lexrag_core::prompt::{build_context, build_prompt};
use lexrag_core::score::ScoringPolicy;
use lexrag_core::search::{retrieve, RetrieveParams};
use lexrag_core::store::Store;

use crate::config::Config;
use crate::error::RagError;
use crate::generator::{GenerateError, GenerateParams, Generator};

/// A validated question.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    question: String,
    top_k: usize,
    temperature: f64,
}

impl QueryRequest {
    /// Rejects a blank question, `top_k` outside `[1, max_top_k]`, and a
    /// temperature outside `[0, 1]`.
    pub fn new(
        question: impl Into<String>,
        top_k: usize,
        temperature: f64,
        max_top_k: usize,
    ) -> Result<Self, ConfigError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(ConfigError::EmptyQuestion);
        }
        if top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if top_k > max_top_k {
            return Err(ConfigError::TopKTooLarge {
                top_k,
                max: max_top_k,
            });
        }
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::TemperatureOutOfRange(temperature));
        }
        Ok(Self {
            question,
            top_k,
            temperature,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

/// The final answer returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub question: String,
    pub answer: String,
    /// Chunks that contributed (wholly or partly) to the prompt context.
    pub context_chunks: usize,
    /// Wall time spent in the generator, retries included.
    pub inference_time_ms: u64,
    pub model: String,
}

/// Engine tuning, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub scoring: ScoringPolicy,
    pub max_context_chars: usize,
    pub max_top_k: usize,
    pub attempt_timeout: Duration,
    pub max_retries: u32,
}

impl RagSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scoring: config.retrieval.scoring,
            max_context_chars: config.retrieval.max_context_chars,
            max_top_k: config.retrieval.max_top_k,
            attempt_timeout: config.generator.timeout(),
            max_retries: config.generator.max_retries,
        }
    }
}

struct Generation {
    text: String,
    attempts: u32,
}

/// Shared handle over the store and the generator.
pub struct RagEngine {
    store: Arc<dyn Store>,
    generator: Arc<dyn Generator>,
    settings: RagSettings,
}

impl RagEngine {
    pub fn new(store: Arc<dyn Store>, generator: Arc<dyn Generator>, settings: RagSettings) -> Self {
        Self {
            store,
            generator,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Rank chunks for `query` without generating an answer.
    pub fn search(&self, query: &str, top_k: usize) -> Result<QueryResult, RagError> {
        if top_k > self.settings.max_top_k {
            return Err(ConfigError::TopKTooLarge {
                top_k,
                max: self.settings.max_top_k,
            }
            .into());
        }
        let params = RetrieveParams::new(top_k, self.settings.scoring)?;
        Ok(retrieve(self.store.as_ref(), query, &params))
    }

    /// Answer a question from the ingested corpus.
    ///
    /// Fails with [`RagError::RetrievalEmpty`] if nothing has been ingested
    /// and with [`RagError::GenerationFailure`] once retries are exhausted.
    /// A non-empty store always yields context, even when no chunk shares a
    /// term with the question.
    pub async fn answer(&self, request: &QueryRequest) -> Result<RagAnswer, RagError> {
        let params = RetrieveParams::new(request.top_k(), self.settings.scoring)?;
        let result = retrieve(self.store.as_ref(), request.question(), &params);
        if result.is_empty() {
            return Err(RagError::RetrievalEmpty);
        }

        let best_score = result.hits.first().map(|h| h.score).unwrap_or(0.0);
        if best_score == 0.0 {
            tracing::debug!(
                question = request.question(),
                "no chunk shares a term with the question; answering with unranked context"
            );
        }

        let context = build_context(&result, self.settings.max_context_chars);
        let prompt = build_prompt(&context.text, request.question());
        tracing::debug!(
            retrieved = result.len(),
            context_chunks = context.chunks_used,
            context_chars = context.text.chars().count(),
            truncated = context.truncated,
            "assembled prompt context"
        );

        let started = Instant::now();
        let generation = self
            .generate_with_retry(
                &prompt,
                &GenerateParams {
                    temperature: request.temperature(),
                },
            )
            .await?;
        let elapsed = started.elapsed();

        tracing::info!(
            model = self.generator.model(),
            attempts = generation.attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            context_chunks = context.chunks_used,
            "answer generated"
        );

        Ok(RagAnswer {
            question: request.question().to_string(),
            answer: generation.text,
            context_chunks: context.chunks_used,
            inference_time_ms: elapsed.as_millis() as u64,
            model: self.generator.model().to_string(),
        })
    }

    /// Bounded retry loop: one attempt plus up to `max_retries` retries of
    /// transient failures. No backoff beyond the attempt timeout itself.
    async fn generate_with_retry(
        &self,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<Generation, RagError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(
                self.settings.attempt_timeout,
                self.generator.generate(prompt, params),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerateError::Timeout),
            };

            match outcome {
                Ok(text) => return Ok(Generation { text, attempts: attempt }),
                Err(e) if e.is_transient() && attempt <= self.settings.max_retries => {
                    tracing::warn!(attempt, error = %e, "generation attempt failed, retrying");
                }
                Err(e) => {
                    tracing::error!(attempts = attempt, error = %e, "generation failed");
                    return Err(RagError::GenerationFailure {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexrag_core::chunk::{chunk_text, ChunkParams};
    use lexrag_core::models::Document;
    use lexrag_core::store::memory::InMemoryStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    enum Step {
        Reply(&'static str),
        Fail(GenerateError),
        Hang,
    }

    /// Plays back a fixed script of outcomes and records every prompt.
    struct ScriptedGenerator {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicU32::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str, _params: &GenerateParams) -> Result<String, GenerateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(text)) => Ok(text.to_string()),
                Some(Step::Fail(e)) => Err(e),
                Some(Step::Hang) | None => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }

        async fn is_reachable(&self) -> bool {
            true
        }
    }

    fn settings() -> RagSettings {
        RagSettings {
            scoring: ScoringPolicy::Raw,
            max_context_chars: 1000,
            max_top_k: 10,
            attempt_timeout: Duration::from_millis(50),
            max_retries: 2,
        }
    }

    fn engine_with(texts: &[&str], generator: Arc<ScriptedGenerator>) -> RagEngine {
        let store = InMemoryStore::new();
        let params = ChunkParams::new(500, 100).unwrap();
        for text in texts {
            let doc = Document::new("doc.txt", "text/plain", text.to_string());
            store.ingest(doc, chunk_text(text, &params));
        }
        RagEngine::new(Arc::new(store), generator, settings())
    }

    fn ask(question: &str) -> QueryRequest {
        QueryRequest::new(question, 3, 0.3, 10).unwrap()
    }

    #[test]
    fn query_request_validation() {
        assert_eq!(QueryRequest::new("  ", 3, 0.3, 10), Err(ConfigError::EmptyQuestion));
        assert_eq!(QueryRequest::new("q", 0, 0.3, 10), Err(ConfigError::ZeroTopK));
        assert_eq!(
            QueryRequest::new("q", 11, 0.3, 10),
            Err(ConfigError::TopKTooLarge { top_k: 11, max: 10 })
        );
        assert_eq!(
            QueryRequest::new("q", 3, 1.5, 10),
            Err(ConfigError::TemperatureOutOfRange(1.5))
        );
        assert!(QueryRequest::new("q", 10, 0.0, 10).is_ok());
        assert!(QueryRequest::new("q", 1, 1.0, 10).is_ok());
    }

    #[tokio::test]
    async fn answers_with_ranked_context() {
        let generator = ScriptedGenerator::new(vec![Step::Reply("Blue.")]);
        let engine = engine_with(
            &["The sky is blue on clear days.", "Grass is green."],
            generator.clone(),
        );
        let answer = engine.answer(&ask("What color is the sky?")).await.unwrap();
        assert_eq!(answer.answer, "Blue.");
        assert_eq!(answer.context_chunks, 2);
        assert_eq!(answer.model, "scripted");
        assert_eq!(answer.question, "What color is the sky?");

        let prompts = generator.prompts.lock().unwrap();
        let prompt = &prompts[0];
        let sky = prompt.find("The sky is blue").unwrap();
        let grass = prompt.find("Grass is green").unwrap();
        assert!(sky < grass, "best match should come first");
    }

    #[tokio::test]
    async fn empty_store_is_retrieval_empty() {
        let generator = ScriptedGenerator::new(vec![Step::Reply("unused")]);
        let engine = engine_with(&[], generator.clone());
        let err = engine.answer(&ask("anything")).await.unwrap_err();
        assert!(matches!(err, RagError::RetrievalEmpty));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn irrelevant_context_still_answers() {
        let generator = ScriptedGenerator::new(vec![Step::Reply("I do not know.")]);
        let engine = engine_with(&["alpha", "beta", "gamma", "delta"], generator.clone());
        let answer = engine.answer(&ask("zebra?")).await.unwrap();
        assert_eq!(answer.context_chunks, 3);
        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("alpha\n\nbeta\n\ngamma"));
        assert!(!prompt.contains("delta"));
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let generator = ScriptedGenerator::new(vec![
            Step::Fail(GenerateError::BackendUnavailable("503".into())),
            Step::Hang,
            Step::Reply("finally"),
        ]);
        let engine = engine_with(&["some text"], generator.clone());
        let answer = engine.answer(&ask("text")).await.unwrap();
        assert_eq!(answer.answer, "finally");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeouts_on_every_attempt_fail() {
        let generator = ScriptedGenerator::new(vec![Step::Hang, Step::Hang, Step::Hang, Step::Reply("never")]);
        let engine = engine_with(&["some text"], generator.clone());
        let err = engine.answer(&ask("text")).await.unwrap_err();
        match err {
            RagError::GenerationFailure { attempts, source } => {
                assert_eq!(attempts, 3);
                assert_eq!(source, GenerateError::Timeout);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let generator = ScriptedGenerator::new(vec![
            Step::Fail(GenerateError::Rejected("HTTP 404: model not found".into())),
            Step::Reply("unused"),
        ]);
        let engine = engine_with(&["some text"], generator.clone());
        let err = engine.answer(&ask("text")).await.unwrap_err();
        assert!(matches!(err, RagError::GenerationFailure { attempts: 1, .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn context_budget_limits_chunks_used() {
        let generator = ScriptedGenerator::new(vec![Step::Reply("ok")]);
        let store = InMemoryStore::new();
        let text = "word ".repeat(400);
        let doc = Document::new("long.txt", "text/plain", text.clone());
        store.ingest(doc, chunk_text(&text, &ChunkParams::new(500, 100).unwrap()));
        let engine = RagEngine::new(
            Arc::new(store),
            generator.clone(),
            RagSettings {
                max_context_chars: 600,
                ..settings()
            },
        );
        let answer = engine.answer(&ask("word")).await.unwrap();
        assert_eq!(answer.context_chunks, 2);
    }

    #[test]
    fn search_validates_top_k() {
        let engine = engine_with(&["a b c"], ScriptedGenerator::new(vec![]));
        assert!(matches!(engine.search("a", 0), Err(RagError::Configuration(ConfigError::ZeroTopK))));
        assert!(engine.search("a", 11).is_err());
        assert_eq!(engine.search("a", 5).unwrap().len(), 1);
    }
}
