pub mod api;
pub mod parse;
pub mod types;

pub use api::{MessageSender, TelegramBot};
pub use parse::parse_update;
pub use types::{Update, UpdateKind};
