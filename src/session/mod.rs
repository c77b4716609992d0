//! Conversational session state.
//!
//! Tracks the single pending interaction per user ("the next message is a
//! URL for TikTok", "the next message is a broadcast body") so free text can
//! be interpreted in context.

mod manager;
mod state;

pub use manager::SessionManager;
pub use state::{Session, SessionRecord, SessionState};
