//! Prompt and context assembly.
//!
//! Every grounded answer uses the same template:
//!
//! ```text
//! {instruction}
//!
//! Context: {context, or "None" when empty}
//!
//! Question: {question}
//! ```

use crate::types::{Message, Passage};

/// Instruction restricting answers to the supplied context.
pub const STRICT_INSTRUCTION: &str = "You are a helpful AI assistant.\n\
Answer the user's question strictly based on the provided context below.\n\
If the answer is not present in the context, state \"I don't know\" or \"The answer is not in the provided documents.\"\n\
Do not use outside knowledge.";

/// Instruction preferring the context but allowing general knowledge.
pub const GENERAL_INSTRUCTION: &str = "You are a helpful AI assistant.\n\
Answer the user's question using the provided context below when it is relevant.\n\
If the context does not contain the answer, answer from your general knowledge and say that the documents did not cover it.";

/// Label heading the conversation block inside the context.
pub const HISTORY_LABEL: &str = "Conversation history:";

/// Label heading the retrieved passages inside the context.
pub const DOCUMENTS_LABEL: &str = "Retrieved documents:";

/// Pick the system instruction for the configured strictness.
pub fn instruction(strict_context: bool) -> &'static str {
    if strict_context {
        STRICT_INSTRUCTION
    } else {
        GENERAL_INSTRUCTION
    }
}

/// Render the full grounded prompt.
pub fn build_prompt(instruction: &str, context: &str, question: &str) -> String {
    let context = if context.trim().is_empty() {
        "None"
    } else {
        context
    };
    format!("{instruction}\n\nContext: {context}\n\nQuestion: {question}")
}

/// Assemble the context block from history and passages.
///
/// History, when present, comes first as its own labeled block. With neither
/// history nor passages the context is the empty string.
pub fn build_context(history: &str, passages: &[Passage]) -> String {
    let documents = passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    match (history.trim().is_empty(), documents.is_empty()) {
        (true, true) => String::new(),
        (true, false) => documents,
        (false, true) => format!("{HISTORY_LABEL}\n{history}"),
        (false, false) => format!("{HISTORY_LABEL}\n{history}\n\n{DOCUMENTS_LABEL}\n{documents}"),
    }
}

/// Render prior chat messages as `role: content` lines.
pub fn format_chat_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for a standalone rewrite of a follow-up question.
pub fn contextualize_prompt(history: &str, question: &str) -> String {
    format!(
        "Given the following conversation and a follow-up question, rephrase the follow-up \
         question to be a standalone question that can be understood without the conversation. \
         Return only the rewritten question.\n\n\
         Conversation:\n{history}\n\n\
         Follow-up question: {question}\n\n\
         Standalone question:"
    )
}
