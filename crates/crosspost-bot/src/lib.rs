//! Telegram side of the system: turns bot updates into [`event::BotEvent`]s
//! and routes them through an explicit [`dispatch::Dispatcher`].

pub mod admins;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handlers;
pub mod listener;
pub mod reply;

pub use dispatch::Dispatcher;
pub use error::{BotError, Result};
pub use event::{BotEvent, EventKind};
pub use listener::{Services, start_polling};
