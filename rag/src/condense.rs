use tracing::debug;

use crate::build_prompt::{format_history, ChatMessage};
use crate::error::RagError;
use crate::generate::LanguageModel;
use crate::prompts::condense_prompt;
use crate::session::{Message, Role};

/// Rewrites a follow-up into a standalone question using prior turns.
/// Without any earlier user turn the query is already standalone.
pub(crate) fn condense_question(
    llm: &dyn LanguageModel,
    history: &[Message],
    query: &str,
) -> Result<String, RagError> {
    if !history.iter().any(|m| m.role == Role::User) {
        return Ok(query.to_string());
    }

    let prompt = condense_prompt(&format_history(history), query);
    let rewritten = llm.complete(&[ChatMessage::user(prompt)])?;
    let rewritten = rewritten.trim();
    if rewritten.is_empty() {
        return Ok(query.to_string());
    }
    debug!(standalone = %rewritten, "condensed follow-up");
    Ok(rewritten.to_string())
}
