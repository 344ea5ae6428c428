//! Conversational retrieval engine.
//!
//! A turn runs in up to four steps depending on [`ChatMode`]:
//! 1. condense the follow-up into a standalone question,
//! 2. retrieve the `top_k` closest chunks for it,
//! 3. assemble system prompt, context, recent history and the query,
//! 4. open a streamed completion.
//!
//! Any failure along the way surfaces as [`RagError::GenerationFailed`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::build_prompt::build_prompt_with_context;
use crate::condense::condense_question;
use crate::config::Config;
use crate::error::RagError;
use crate::generate::{FragmentStream, LanguageModel, TogetherChat};
use crate::http::HttpClient;
use crate::index::KnowledgeIndex;
use crate::retrieve_chunks::Hit;
use crate::session::Message;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatMode {
    /// No condense, no retrieval.
    Simple,
    /// Retrieval on the raw query.
    Context,
    CondensePlusContext,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Simple => "simple",
            ChatMode::Context => "context",
            ChatMode::CondensePlusContext => "condense_plus_context",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ChatMode::Simple),
            "context" => Ok(ChatMode::Context),
            "condense_plus_context" => Ok(ChatMode::CondensePlusContext),
            other => Err(RagError::Configuration(format!("unknown chat mode: {}", other))),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    pub top_k: usize,
    pub mode: ChatMode,
    pub history_window: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            mode: ChatMode::CondensePlusContext,
            history_window: 20,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            top_k: cfg.top_k,
            mode: cfg.chat_mode,
            history_window: cfg.history_window,
        }
    }
}

pub struct ChatEngine {
    index: Arc<KnowledgeIndex>,
    llm: Arc<dyn LanguageModel>,
    system_prompt: String,
    options: EngineOptions,
}

impl ChatEngine {
    pub fn new(
        index: Arc<KnowledgeIndex>,
        llm: Arc<dyn LanguageModel>,
        system_prompt: impl Into<String>,
        options: EngineOptions,
    ) -> Self {
        Self {
            index,
            llm,
            system_prompt: system_prompt.into(),
            options,
        }
    }

    /// Engine backed by the Together chat model named in `cfg`.
    pub fn from_config(cfg: &Config, index: Arc<KnowledgeIndex>) -> Result<Self, RagError> {
        let http = HttpClient::new(cfg.http_timeout).map_err(RagError::service_unavailable)?;
        let llm = TogetherChat::new(http, cfg);
        info!(model = %cfg.chat_model, mode = %cfg.chat_mode, top_k = cfg.top_k, "chat engine ready");
        Ok(Self::new(index, Arc::new(llm), cfg.system_prompt.clone(), EngineOptions::from(cfg)))
    }

    pub fn stream_chat(&self, query: &str, history: &[Message]) -> Result<ReplyStream, RagError> {
        let standalone = match self.options.mode {
            ChatMode::CondensePlusContext => condense_question(self.llm.as_ref(), history, query)
                .map_err(RagError::into_generation_failure)?,
            ChatMode::Context | ChatMode::Simple => query.to_string(),
        };

        let hits = match self.options.mode {
            ChatMode::Simple => Vec::new(),
            ChatMode::Context | ChatMode::CondensePlusContext => self
                .index
                .retrieve(&standalone, self.options.top_k)
                .map_err(RagError::into_generation_failure)?,
        };
        debug!(index = %self.index.name(), hits = hits.len(), "retrieved context");

        let messages = build_prompt_with_context(
            &self.system_prompt,
            &hits,
            history,
            self.options.history_window,
            query,
        );
        let fragments = self
            .llm
            .stream(&messages)
            .map_err(RagError::into_generation_failure)?;
        Ok(ReplyStream::new(fragments, hits))
    }
}

/// Streamed reply for one turn. Single pass; the full text is available
/// from [`ReplyStream::response`] once the iterator is exhausted.
pub struct ReplyStream {
    fragments: FragmentStream,
    sources: Vec<Hit>,
    response: String,
    finished: bool,
}

impl ReplyStream {
    pub fn new(fragments: FragmentStream, sources: Vec<Hit>) -> Self {
        Self {
            fragments,
            sources,
            response: String::new(),
            finished: false,
        }
    }

    pub fn sources(&self) -> &[Hit] {
        &self.sources
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_parts(self) -> (String, Vec<Hit>) {
        (self.response, self.sources)
    }
}

impl Iterator for ReplyStream {
    type Item = Result<String, RagError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.fragments.next() {
            Some(Ok(fragment)) => {
                self.response.push_str(&fragment);
                Some(Ok(fragment))
            }
            Some(Err(err)) => {
                self.finished = true;
                Some(Err(err.into_generation_failure()))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}
