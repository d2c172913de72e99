//! Notify module - delivery adapters for alert messages

pub mod log;
pub mod telegram;

pub use log::LogNotifier;
pub use telegram::TelegramNotifier;
