pub mod commands;
pub mod format;
pub mod log;
pub mod telegram;
pub mod traits;

pub use commands::{Command, CommandListener};
pub use log::LogNotifier;
pub use telegram::{TelegramClient, TelegramNotifier};
pub use traits::Notifier;
