//! System prompt assembly.

use brain_core::ChatMessage;

use crate::retrieval::RetrievalResult;

/// Platform-wide instructions placed ahead of every tenant prompt.
pub const BASE_PROMPT: &str = "Always provide helpful, polite, and accurate responses based only on the information and tools provided.
Approach each question or task with logical reasoning, breaking down complex problems into steps if needed. Use any provided data to perform simple calculations or comparisons when appropriate, but only if the context clearly supports it.
Anticipate what logically follows from the user's query or scenario, and when appropriate, offer additional relevant guidance or information even if it wasn't explicitly requested.
If a question cannot be answered using the provided information, clearly admit that you do not know or cannot answer. Do not guess or provide information that isn't supported by the context.
Maintain a polite and respectful tone at all times. Do not adopt any specific persona or style beyond what the user's instructions specify.
Use only the knowledge and resources provided (via the conversation context or authorized tools). Do not use outside information, and do not attempt any web searches or external data retrieval.
When providing Google Maps links, always use the format \"https://maps.google.com/maps?q=\" followed by the location or address. Never use embedded map URLs or iframe-style Google Maps links.";

/// Tenant prompt used when a chatbot has none configured.
pub const DEFAULT_TENANT_PROMPT: &str =
    "You are a helpful AI assistant. Answer based only on the provided context.";

/// Separator between prompt sections and between context chunks.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

const PRECEDENCE_INSTRUCTION: &str = "You are answering the LATEST user question. Use the conversation history to resolve references to earlier topics.
The user-defined instructions above take precedence. If they answer the question, rely on them first.
The context from documents below is supplementary. Use it when the user-defined instructions do not cover the question.
If no source provides a sufficient answer, state clearly that you cannot answer based on the provided information. Do not make up information or rely on knowledge outside these sources.";

/// Base instructions followed by the tenant's own prompt.
pub fn tenant_section(tenant_prompt: Option<&str>) -> String {
    let prompt = tenant_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_TENANT_PROMPT);
    format!("{BASE_PROMPT}{SECTION_SEPARATOR}User-defined instructions:\n{prompt}\n---")
}

/// Full system prompt: tenant section, precedence rule, then retrieved context.
///
/// An empty retrieval result contributes the no-context sentinel so the
/// context block is never blank.
pub fn build_system_prompt(tenant_prompt: Option<&str>, retrieval: &RetrievalResult) -> String {
    let context = retrieval.context_texts().join(SECTION_SEPARATOR);
    format!(
        "{}\n\n{}\n\nContext from documents:\n---\n{}\n---",
        tenant_section(tenant_prompt),
        PRECEDENCE_INSTRUCTION,
        context
    )
}

/// Everything sent to the completion service for one request.
///
/// Rebuilt on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub user_query: String,
}

impl PromptContext {
    /// `[system, ...history, user]`.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt));
        messages.extend(self.history);
        messages.push(ChatMessage::user(self.user_query));
        messages
    }
}
