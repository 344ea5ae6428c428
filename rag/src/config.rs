use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::ChatMode;
use crate::error::RagError;
use crate::prompts::SYSTEM_PROMPT;

#[derive(Clone)]
pub struct Config {
    pub together_api_key: String,
    pub pinecone_api_key: String,
    pub together_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub pinecone_control_url: String,
    pub pinecone_index: String,
    pub pinecone_namespace: Option<String>,
    pub pinecone_api_version: String,
    pub top_k: usize,
    pub chat_mode: ChatMode,
    pub history_window: usize,
    pub system_prompt: String,
    pub http_timeout: Duration,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, RagError> {
        // Load .env if present so keys work without exporting them by hand.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| RagError::Configuration(format!("{} is not set", key)))
        };

        let together_api_key = require("TOGETHER_API_KEY")?;
        let pinecone_api_key = require("PINECONE_API_KEY")?;

        let top_k = get("RAG_TOP_K").and_then(|v| v.parse().ok()).unwrap_or(5);
        if top_k == 0 {
            return Err(RagError::Configuration("RAG_TOP_K must be at least 1".to_string()));
        }

        let chat_mode = match get("RAG_CHAT_MODE") {
            Some(raw) => raw.parse::<ChatMode>()?,
            None => ChatMode::CondensePlusContext,
        };

        Ok(Self {
            together_api_key,
            pinecone_api_key,
            together_url: get("TOGETHER_URL")
                .unwrap_or_else(|| "https://api.together.xyz".to_string())
                .trim_end_matches('/')
                .to_string(),
            chat_model: get("TOGETHER_CHAT_MODEL")
                .unwrap_or_else(|| "meta-llama/Llama-3-70b-chat-hf".to_string()),
            embed_model: get("TOGETHER_EMBED_MODEL")
                .unwrap_or_else(|| "togethercomputer/m2-bert-80M-8k-retrieval".to_string()),
            pinecone_control_url: get("PINECONE_CONTROL_URL")
                .unwrap_or_else(|| "https://api.pinecone.io".to_string())
                .trim_end_matches('/')
                .to_string(),
            pinecone_index: get("PINECONE_INDEX").unwrap_or_else(|| "reconnect-db".to_string()),
            pinecone_namespace: get("PINECONE_NAMESPACE"),
            pinecone_api_version: get("PINECONE_API_VERSION")
                .unwrap_or_else(|| "2024-07".to_string()),
            top_k,
            chat_mode,
            history_window: get("RAG_HISTORY_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            system_prompt: get("RAG_SYSTEM_PROMPT").unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            http_timeout: Duration::from_secs(
                get("RECONNECT_HTTP_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
            ),
            log_dir: get("RECONNECT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("together_api_key", &"<redacted>")
            .field("pinecone_api_key", &"<redacted>")
            .field("together_url", &self.together_url)
            .field("chat_model", &self.chat_model)
            .field("embed_model", &self.embed_model)
            .field("pinecone_control_url", &self.pinecone_control_url)
            .field("pinecone_index", &self.pinecone_index)
            .field("pinecone_namespace", &self.pinecone_namespace)
            .field("top_k", &self.top_k)
            .field("chat_mode", &self.chat_mode)
            .field("history_window", &self.history_window)
            .field("http_timeout", &self.http_timeout)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}
