use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use selma_core::{Language, MessageRole};
use selma_db::repositories::{MessageRepository, RepositoryError, UserRepository};

use crate::language::classify;
use crate::llm::{CompletionClient, CompletionError};
use crate::prompt::{ContextAssembler, PromptError};

/// Upper bound on one outbound message body, in characters.
pub const MAX_OUTBOUND_CHARS: usize = 256;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("outbound send failed: {0}")]
    Send(String),
    #[error("outbound send rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Narrow seam to the messaging channel's egress.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    async fn deliver(&self, to: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Transport that drops everything; wiring scaffolds and tests.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl OutboundTransport for NoopTransport {
    async fn deliver(&self, _to: &str, _body: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// What one successfully relayed message produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayOutcome {
    pub language: Language,
    pub delivered_body: String,
}

/// The per-request orchestrator. Safe to invoke concurrently from
/// independent callers; near-simultaneous messages from the same identity
/// may interleave on history reads, which the store tolerates (the create
/// is idempotent, history is append-only).
pub struct ConversationPipeline {
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    assembler: ContextAssembler,
    completion: Arc<dyn CompletionClient>,
    transport: Arc<dyn OutboundTransport>,
}

impl ConversationPipeline {
    pub fn new(
        users: Arc<dyn UserRepository>,
        messages: Arc<dyn MessageRepository>,
        assembler: ContextAssembler,
        completion: Arc<dyn CompletionClient>,
        transport: Arc<dyn OutboundTransport>,
    ) -> Self {
        Self { users, messages, assembler, completion, transport }
    }

    /// Relays one inbound message. Steps run strictly in order; the first
    /// failure aborts the rest and leaves already-committed rows in place —
    /// losing the inbound message would be worse than re-processing it.
    pub async fn handle_inbound(
        &self,
        sender: &str,
        raw_text: &str,
        correlation_id: &str,
    ) -> Result<RelayOutcome, PipelineError> {
        self.messages.record(sender, MessageRole::User, raw_text).await?;
        info!(
            event_name = "pipeline.inbound_persisted",
            correlation_id,
            user_key = sender,
            "inbound message persisted"
        );

        if !self.users.exists(sender).await? {
            // Name capture happens in a separate flow; first contact starts
            // unnamed rather than misusing the message text as a name.
            self.users.create(sender, "").await?;
            info!(
                event_name = "pipeline.user_created",
                correlation_id,
                user_key = sender,
                "user record created on first contact"
            );
        }

        let language = classify(raw_text);
        self.users.update_language(sender, language).await?;
        info!(
            event_name = "pipeline.language_resolved",
            correlation_id,
            user_key = sender,
            language = language.as_tag(),
            "language classification stored"
        );

        let prompt = self.assembler.build_prompt(sender).await?;
        info!(
            event_name = "pipeline.context_built",
            correlation_id,
            user_key = sender,
            prompt_entries = prompt.len(),
            "prompt context assembled"
        );

        let ai_text = self.completion.complete(&prompt).await?;
        self.messages.record(sender, MessageRole::Ai, &ai_text).await?;
        info!(
            event_name = "pipeline.reply_persisted",
            correlation_id,
            user_key = sender,
            "generated reply persisted"
        );

        let delivered_body = truncate_reply(&ai_text, MAX_OUTBOUND_CHARS);
        if let Err(error) = self.transport.deliver(sender, &delivered_body).await {
            // The reply is already in history; the counterpart just never
            // received it. Nothing is rolled back.
            warn!(
                event_name = "pipeline.delivery_failed",
                correlation_id,
                user_key = sender,
                error = %error,
                "outbound delivery failed after reply persistence"
            );
            return Err(error.into());
        }
        info!(
            event_name = "pipeline.delivered",
            correlation_id,
            user_key = sender,
            "reply delivered"
        );

        Ok(RelayOutcome { language, delivered_body })
    }
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::{truncate_reply, MAX_OUTBOUND_CHARS};

    #[test]
    fn short_replies_pass_through_unchanged() {
        assert_eq!(truncate_reply("hello", MAX_OUTBOUND_CHARS), "hello");
        assert_eq!(truncate_reply("", MAX_OUTBOUND_CHARS), "");
    }

    #[test]
    fn long_replies_are_cut_at_the_character_cap() {
        let long: String = std::iter::repeat('a').take(300).collect();
        let truncated = truncate_reply(&long, MAX_OUTBOUND_CHARS);
        assert_eq!(truncated.chars().count(), 256);
        assert_eq!(truncated, long[..256]);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long: String = std::iter::repeat('ж').take(300).collect();
        let truncated = truncate_reply(&long, MAX_OUTBOUND_CHARS);
        assert_eq!(truncated.chars().count(), 256);
        assert!(long.starts_with(&truncated));
    }

    #[test]
    fn boundary_length_is_kept_whole() {
        let exact: String = std::iter::repeat('x').take(256).collect();
        assert_eq!(truncate_reply(&exact, MAX_OUTBOUND_CHARS), exact);
    }
}
