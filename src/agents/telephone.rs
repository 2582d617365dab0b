//! 传话协作者：实现代码 → 重新描述的规格
//!
//! 与掩码变异互补：规格经由代码"转述"一次，丢掉原文措辞，只保留实现真正体现的内容。

use std::sync::Arc;

use crate::agents::prompts::{system_prompt, PromptKind};
use crate::agents::{Agent, AgentSettings};
use crate::core::CollaboratorError;
use crate::llm::{CompletionOptions, LlmClient};

pub struct TelephoneAgent {
    agent: Agent,
    temperature: f32,
}

impl TelephoneAgent {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            agent: Agent::new(
                llm,
                system_prompt(settings.prompts_dir.as_deref(), PromptKind::Telephone),
                settings.history_turns,
            ),
            temperature: 0.0,
        }
    }

    /// 温度越高，转述偏离原规格越远
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn describe(&self, code: &str) -> Result<String, CollaboratorError> {
        let message = format!("Here is some code to write a prompt for:\n```\n{code}\n```");
        let answer = self
            .agent
            .answer(&message, CompletionOptions::with_temperature(self.temperature), &["prompt"])
            .await?;
        Ok(answer.fields[0].trim().to_string())
    }
}
