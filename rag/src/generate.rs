use std::io::{BufRead, BufReader, Lines, Read};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::build_prompt::ChatMessage;
use crate::config::Config;
use crate::error::RagError;
use crate::http::{Auth, HttpClient};

/// Lazy, forward-only sequence of reply fragments.
pub type FragmentStream = Box<dyn Iterator<Item = Result<String, RagError>> + Send>;

/// Chat-completion backend used for the condense and generation steps.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, RagError>;

    fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, RagError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Together's OpenAI-compatible chat completions endpoint.
pub(crate) struct TogetherChat {
    http: HttpClient,
    url: String,
    model: String,
    api_key: String,
}

impl TogetherChat {
    pub(crate) fn new(http: HttpClient, cfg: &Config) -> Self {
        Self {
            http,
            url: format!("{}/v1/chat/completions", cfg.together_url),
            model: cfg.chat_model.clone(),
            api_key: cfg.together_api_key.clone(),
        }
    }
}

impl LanguageModel for TogetherChat {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, RagError> {
        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let res = self
            .http
            .post_json::<ChatResponse, _>(&self.url, Auth::Bearer(&self.api_key), &req)
            .map_err(RagError::service_unavailable)?;
        Ok(first_choice_content(res))
    }

    fn stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, RagError> {
        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        debug!(model = %self.model, messages = messages.len(), "opening completion stream");
        let resp = self
            .http
            .post_stream(&self.url, Auth::Bearer(&self.api_key), &req)
            .map_err(RagError::service_unavailable)?;
        Ok(Box::new(SseFragments::new(resp)))
    }
}

fn first_choice_content(res: ChatResponse) -> String {
    res.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default()
}

/// One parsed line of a server-sent completion stream.
#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Delta(String),
    Done,
    Error(String),
    Ignore,
}

pub fn parse_sse_line(line: &str) -> SseEvent {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Ignore;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(json) = serde_json::from_str::<Value>(data) else {
        return SseEvent::Ignore;
    };
    if let Some(err) = json.get("error") {
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return SseEvent::Error(msg);
    }
    match json["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => SseEvent::Delta(content.to_string()),
        _ => SseEvent::Ignore,
    }
}

/// Reads `data:` lines off a streaming response until `[DONE]`. Reaching
/// EOF before `[DONE]` is reported as a failed generation.
pub struct SseFragments<R> {
    lines: Lines<BufReader<R>>,
    finished: bool,
}

impl<R: Read> SseFragments<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            finished: false,
        }
    }
}

impl<R: Read> Iterator for SseFragments<R> {
    type Item = Result<String, RagError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(RagError::GenerationFailed(format!(
                        "stream read failed: {}",
                        err
                    ))));
                }
                None => {
                    self.finished = true;
                    return Some(Err(RagError::GenerationFailed(
                        "stream ended before [DONE]".to_string(),
                    )));
                }
            };
            match parse_sse_line(&line) {
                SseEvent::Delta(text) => return Some(Ok(text)),
                SseEvent::Done => {
                    self.finished = true;
                    return None;
                }
                SseEvent::Error(msg) => {
                    self.finished = true;
                    return Some(Err(RagError::GenerationFailed(msg)));
                }
                SseEvent::Ignore => {}
            }
        }
        None
    }
}
