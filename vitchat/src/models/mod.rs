//! Data models for chat messages and sessions.

mod message;
mod session;

pub use message::{Message, MessageRole};
pub use session::ChatSession;
