//! 记忆层：协作者的有界对话历史

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role};
