//! Conversation orchestration for the selma relay.
//!
//! One inbound message flows through a strictly sequential pipeline:
//! persist inbound → resolve user → classify language → assemble context →
//! complete → persist reply → deliver. The crate owns the seams to the
//! completion provider and the outbound transport; the store is reached
//! through the repository traits in `selma-db`.

pub mod language;
pub mod llm;
pub mod pipeline;
pub mod prompt;

pub use pipeline::{ConversationPipeline, DeliveryError, OutboundTransport, PipelineError};
