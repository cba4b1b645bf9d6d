//! Store gateway for the selma relay: pooled sqlite access, embedded
//! migrations, and the user/message repositories.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
