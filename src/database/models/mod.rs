//! Persisted models.

pub mod channel;
pub mod history;
pub mod user;

pub use channel::HistoryChannel;
pub use history::{DownloadHistoryEntry, HISTORY_CAP};
pub use user::{Profile, UserRecord};
