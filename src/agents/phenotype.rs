//! 表型协作者：问题 → 自然语言规格

use std::sync::Arc;

use crate::agents::prompts::{system_prompt, PromptKind};
use crate::agents::{Agent, AgentSettings};
use crate::core::CollaboratorError;
use crate::llm::{CompletionOptions, LlmClient};

pub struct PhenotypeAgent {
    agent: Agent,
    temperature: f32,
}

impl PhenotypeAgent {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            agent: Agent::new(
                llm,
                system_prompt(settings.prompts_dir.as_deref(), PromptKind::Phenotype),
                settings.history_turns,
            ),
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn generate_phenotype(&self, problem: &str) -> Result<String, CollaboratorError> {
        let message = format!(
            "Please come up with a unique prompt for software that will solve the following problem: {problem}"
        );
        let answer = self
            .agent
            .answer(&message, CompletionOptions::with_temperature(self.temperature), &["prompt"])
            .await?;
        Ok(answer.fields[0].trim().to_string())
    }
}
