//! WhatsApp channel adapter (Twilio-backed).
//!
//! Owns both directions of the channel boundary:
//! - **Outbound** (`outbound`) — the Twilio Messages API sender behind the
//!   pipeline's `OutboundTransport` seam.
//! - **Inbound** (`webhook`) — the payload shape Twilio posts to the
//!   relay's webhook endpoint.

pub mod outbound;
pub mod webhook;

pub use outbound::TwilioMessageSender;
pub use webhook::InboundMessage;
