//! Shared configuration and domain types for the selma relay.

pub mod config;
pub mod domain;

pub use domain::message::{ChatMessage, MessageRole, StoredMessage};
pub use domain::user::{Language, UserProfile};
