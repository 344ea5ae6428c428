//! Per-session transcript and the chat loop controller.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::ChatEngine;
use crate::error::RagError;
use crate::prompts::GREETING;
use crate::retrieve_chunks::Hit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatState {
    AwaitingInput,
    /// A user message is waiting for its reply.
    PendingResponse,
}

pub struct Session {
    transcript: Vec<Message>,
    state: ChatState,
    engine: Option<ChatEngine>,
    last_sources: Vec<Hit>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            transcript: vec![Message::assistant(GREETING)],
            state: ChatState::AwaitingInput,
            engine: None,
            last_sources: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Chunks that grounded the most recent completed reply.
    pub fn last_sources(&self) -> &[Hit] {
        &self.last_sources
    }

    /// Appends a user turn. A submission while a reply is still pending
    /// supersedes it; the next cycle answers the newest message.
    pub fn submit(&mut self, input: &str) -> Result<(), RagError> {
        if input.trim().is_empty() {
            return Err(RagError::EmptyMessage);
        }
        if self.state == ChatState::PendingResponse {
            warn!("new message submitted while a reply was pending");
        }
        self.transcript.push(Message::user(input));
        self.state = ChatState::PendingResponse;
        Ok(())
    }

    /// Runs one controller cycle.
    ///
    /// Does nothing while awaiting input. Otherwise builds the engine on first
    /// use, streams exactly one reply through `on_fragment` and appends it.
    /// On failure, including a reply with no text, the transcript is left as
    /// it was and the turn stays pending, so the following cycle retries it.
    pub fn run_cycle<F, S>(&mut self, make_engine: F, mut on_fragment: S) -> Result<Option<&Message>, RagError>
    where
        F: FnOnce() -> Result<ChatEngine, RagError>,
        S: FnMut(&str),
    {
        if self.state == ChatState::AwaitingInput {
            return Ok(None);
        }

        if self.engine.is_none() {
            self.engine = Some(make_engine()?);
        }
        let (Some(engine), Some((last, prior))) = (self.engine.as_ref(), self.transcript.split_last()) else {
            return Ok(None);
        };

        info!(turn = self.transcript.len(), "generating reply");
        let mut stream = engine.stream_chat(&last.content, prior)?;
        for fragment in stream.by_ref() {
            on_fragment(&fragment?);
        }
        let (reply, sources) = stream.into_parts();
        if reply.trim().is_empty() {
            return Err(RagError::GenerationFailed("model returned an empty reply".to_string()));
        }

        self.last_sources = sources;
        self.transcript.push(Message::assistant(reply));
        self.state = ChatState::AwaitingInput;
        Ok(self.transcript.last())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
