#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rag::{
    ChatEngine, ChatMessage, Embedder, EngineOptions, FragmentStream, Hit, KnowledgeIndex,
    LanguageModel, RagError, VectorIndex,
};

pub struct FakeLlm {
    pub condensed: String,
    pub fragments: Vec<String>,
    /// Each failing call yields the first fragment, then breaks.
    pub failures_remaining: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub complete_prompts: Mutex<Vec<String>>,
    pub streamed_messages: Mutex<Vec<ChatMessage>>,
}

impl FakeLlm {
    pub fn replying(fragments: &[&str]) -> Self {
        Self {
            condensed: "standalone question".to_string(),
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            failures_remaining: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            complete_prompts: Mutex::new(Vec::new()),
            streamed_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_once(mut self) -> Self {
        self.failures_remaining = AtomicUsize::new(1);
        self
    }

    pub fn with_condensed(mut self, condensed: &str) -> Self {
        self.condensed = condensed.to_string();
        self
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }
}

impl LanguageModel for FakeLlm {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, RagError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>().join("\n");
        self.complete_prompts.lock().unwrap().push(prompt);
        Ok(self.condensed.clone())
    }

    fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, RagError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.streamed_messages.lock().unwrap() = messages.to_vec();

        let mut items: Vec<Result<String, RagError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            items.truncate(1);
            items.push(Err(RagError::ServiceUnavailable("connection reset".to_string())));
        }
        Ok(Box::new(items.into_iter()))
    }
}

pub struct FakeEmbedder {
    pub queries: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self { queries: Mutex::new(Vec::new()) }
    }
}

impl Embedder for FakeEmbedder {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.queries.lock().unwrap().push(text.to_string());
        Ok(vec![0.5, 0.5])
    }
}

pub struct FakeStore {
    pub hits: Vec<Hit>,
    pub calls: AtomicUsize,
    pub unavailable: bool,
}

impl FakeStore {
    pub fn with_hits(hits: Vec<Hit>) -> Self {
        Self { hits, calls: AtomicUsize::new(0), unavailable: false }
    }

    pub fn down() -> Self {
        Self { hits: Vec::new(), calls: AtomicUsize::new(0), unavailable: true }
    }
}

impl VectorIndex for FakeStore {
    fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<Hit>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(RagError::ServiceUnavailable("index timed out".to_string()));
        }
        Ok(self.hits.clone())
    }
}

pub fn hit(id: &str, score: f32, text: &str) -> Hit {
    Hit { id: id.to_string(), score, text: text.to_string() }
}

pub fn index_with(embedder: Arc<FakeEmbedder>, store: Arc<FakeStore>) -> Arc<KnowledgeIndex> {
    Arc::new(KnowledgeIndex::new("reconnect-test", embedder, store))
}

pub fn engine_with(llm: Arc<FakeLlm>, hits: Vec<Hit>, options: EngineOptions) -> ChatEngine {
    let index = index_with(Arc::new(FakeEmbedder::new()), Arc::new(FakeStore::with_hits(hits)));
    ChatEngine::new(index, llm, "You are a kind listener.", options)
}
