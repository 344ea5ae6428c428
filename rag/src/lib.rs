mod build_prompt;
mod condense;
mod config;
mod embed_query;
mod engine;
mod error;
mod generate;
mod http;
mod index;
mod prompts;
mod retrieve_chunks;
mod session;

pub use build_prompt::ChatMessage;
pub use config::Config;
pub use embed_query::Embedder;
pub use engine::{ChatEngine, ChatMode, EngineOptions, ReplyStream};
pub use error::RagError;
pub use generate::{parse_sse_line, FragmentStream, LanguageModel, SseEvent, SseFragments};
pub use index::{get_index, IndexCache, KnowledgeIndex};
pub use prompts::{GREETING, SYSTEM_PROMPT};
pub use retrieve_chunks::{chunk_text_from_metadata, rank_hits, Hit, VectorIndex};
pub use session::{ChatState, Message, Role, Session};

/// Builds the engine for a new session against the shared index handle.
pub fn create_engine(cfg: &Config) -> Result<ChatEngine, RagError> {
    let index = get_index(cfg)?;
    ChatEngine::from_config(cfg, index)
}
