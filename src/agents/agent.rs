//! 协作者基类：LLM 客户端 + 系统提示词 + 有界对话历史
//!
//! `answer` 发送一次请求，记录交换，并按标签抽取字段；任一标签缺失即为生成失败。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agents::parse::parse_tag;
use crate::core::CollaboratorError;
use crate::llm::{CompletionOptions, LlmClient};
use crate::memory::ConversationMemory;

/// 一次协作者调用的结果：原始输出 + 按请求顺序抽取的字段
#[derive(Debug, Clone)]
pub struct Answer {
    pub raw: String,
    pub fields: Vec<String>,
}

pub struct Agent {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    memory: Mutex<ConversationMemory>,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>, history_turns: usize) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            memory: Mutex::new(ConversationMemory::new(history_turns)),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn answer(
        &self,
        prompt: &str,
        options: CompletionOptions,
        tags: &[&str],
    ) -> Result<Answer, CollaboratorError> {
        let request = self.memory.lock().await.build_request(&self.system_prompt, prompt);
        let raw = self.llm.complete_with(&request, options).await?;
        self.memory.lock().await.record_exchange(prompt, raw.clone());

        let fields = tags
            .iter()
            .map(|tag| parse_tag(tag, &raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Answer { raw, fields })
    }

    /// 清空对话历史
    pub async fn reset(&self) {
        self.memory.lock().await.clear();
    }
}
