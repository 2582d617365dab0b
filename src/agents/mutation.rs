//! 变异协作者：已掩码的规格 → 补全后的规格

use std::sync::Arc;

use crate::agents::prompts::{system_prompt, PromptKind};
use crate::agents::{Agent, AgentSettings};
use crate::core::CollaboratorError;
use crate::llm::{CompletionOptions, LlmClient};

pub struct MutationAgent {
    agent: Agent,
    temperature: f32,
}

impl MutationAgent {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            agent: Agent::new(
                llm,
                system_prompt(settings.prompts_dir.as_deref(), PromptKind::Mutation),
                settings.history_turns,
            ),
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn unmask(&self, masked: &str) -> Result<String, CollaboratorError> {
        let message = format!("Here is a prompt with masked sections:\n{masked}");
        let answer = self
            .agent
            .answer(
                &message,
                CompletionOptions::with_temperature(self.temperature),
                &["unmasked_prompt"],
            )
            .await?;
        Ok(answer.fields[0].trim().to_string())
    }
}
