//! Repository module - flat-file data access layer.

mod channel_repository;
mod history_repository;
mod user_repository;

pub use channel_repository::ChannelRepository;
pub use history_repository::HistoryRepository;
pub use user_repository::UserRepository;
