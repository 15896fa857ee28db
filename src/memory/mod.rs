//! 记忆层：对话消息与短期历史

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role};
