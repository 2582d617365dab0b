//! 协作者的短期记忆：对话历史
//!
//! 每个 Agent 保留最近 N 轮（user + assistant）交换，下一次请求会带上这些历史，
//! 使同一 Agent 连续生成的规格彼此不同。max_turns = 0 表示无状态。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 最近 N 轮对话（每轮含 user + assistant，故实际保留 max_turns*2 条消息）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    /// 记录一次完整交换
    pub fn record_exchange(&mut self, prompt: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(Message::user(prompt));
        self.messages.push(Message::assistant(answer));
        self.prune();
    }

    /// 组装请求：system + 历史 + 本次 user
    pub fn build_request(&self, system_prompt: &str, prompt: &str) -> Vec<Message> {
        let mut request = Vec::with_capacity(self.messages.len() + 2);
        request.push(Message::system(system_prompt));
        request.extend(self.messages.iter().cloned());
        request.push(Message::user(prompt));
        request
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 超出 max_turns*2 时丢弃最旧的消息
    fn prune(&mut self) {
        let keep = self.max_turns * 2;
        if self.messages.len() > keep {
            self.messages.drain(..self.messages.len() - keep);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
