use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Form, Router};
use tracing::{error, info};
use uuid::Uuid;

use selma_agent::pipeline::ConversationPipeline;
use selma_whatsapp::InboundMessage;

#[derive(Clone)]
pub struct WebhookState {
    pipeline: Arc<ConversationPipeline>,
}

pub fn router(pipeline: Arc<ConversationPipeline>) -> Router {
    Router::new().route("/bot", post(inbound)).with_state(WebhookState { pipeline })
}

/// Twilio webhook ingress: one inbound message, one acknowledgment.
///
/// Any pipeline fault maps to a plain 500 — no user-facing error text is
/// synthesized here, and Twilio's own retry policy owns what happens next.
pub async fn inbound(
    State(state): State<WebhookState>,
    Form(message): Form<InboundMessage>,
) -> (StatusCode, &'static str) {
    let correlation_id = Uuid::new_v4().to_string();
    info!(
        event_name = "ingress.webhook.received",
        correlation_id = %correlation_id,
        user_key = %message.from,
        "inbound webhook received"
    );

    match state.pipeline.handle_inbound(&message.from, &message.body, &correlation_id).await {
        Ok(_) => (StatusCode::OK, "message processed"),
        Err(pipeline_error) => {
            error!(
                event_name = "ingress.webhook.failed",
                correlation_id = %correlation_id,
                user_key = %message.from,
                error = %pipeline_error,
                "pipeline failed for inbound webhook"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "message processing failed")
        }
    }
}
