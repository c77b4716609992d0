//! Database module exports.
//!
//! Download history, the user registry and history channels, each kept in
//! its own JSON document under the data directory.

mod models;
mod repository;

pub use models::*;
pub use repository::{ChannelRepository, HistoryRepository, UserRepository};
