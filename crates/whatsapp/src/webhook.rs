use serde::Deserialize;

/// The subset of Twilio's webhook form fields the relay consumes.
///
/// `From` carries the channel identity (e.g. `whatsapp:+15551234567`);
/// `Body` the message text. Twilio omits `Body` for media-only messages,
/// so it defaults to empty rather than failing extraction.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}
