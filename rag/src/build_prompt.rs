use serde::Serialize;

use crate::prompts::context_block;
use crate::retrieve_chunks::Hit;
use crate::session::{Message, Role};

/// Wire-level chat message sent to the completion endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self { role: msg.role.as_str().to_string(), content: msg.content.clone() }
    }
}

/// System prompt + retrieved context, the last `history_window` turns, then the query.
pub(crate) fn build_prompt_with_context(
    system_prompt: &str,
    hits: &[Hit],
    history: &[Message],
    history_window: usize,
    query: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "{}\n\n{}",
        system_prompt.trim_end(),
        context_block(&format_context_from_hits(hits))
    );

    let recent = &history[history.len().saturating_sub(history_window)..];
    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(recent.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(query));
    messages
}

pub(crate) fn format_context_from_hits(hits: &[Hit]) -> String {
    let context_lines: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] {}", i + 1, hit.text.trim()))
        .collect();

    if context_lines.is_empty() {
        "(no context found)".to_string()
    } else {
        context_lines.join("\n\n")
    }
}

/// Renders turns as `user: ...` / `assistant: ...` lines.
pub(crate) fn format_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| {
            let who = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{}: {}", who, m.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
