//! 项目协作者：问题描述 → (接口图纸, 适应度函数片段)

use std::sync::Arc;

use crate::agents::parse::clean_code;
use crate::agents::prompts::{system_prompt, PromptKind};
use crate::agents::{Agent, AgentSettings};
use crate::core::CollaboratorError;
use crate::llm::{CompletionOptions, LlmClient};

/// 项目级产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCodes {
    pub schematic: String,
    pub fitness_fragment: String,
}

pub struct ProjectAgent {
    agent: Agent,
}

impl ProjectAgent {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            agent: Agent::new(
                llm,
                system_prompt(settings.prompts_dir.as_deref(), PromptKind::Project),
                settings.history_turns,
            ),
        }
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.agent.token_usage()
    }

    pub async fn generate_project_codes(&self, prompt: &str) -> Result<ProjectCodes, CollaboratorError> {
        let answer = self
            .agent
            .answer(prompt, CompletionOptions::with_temperature(0.7), &["schematic", "fitness"])
            .await?;
        Ok(ProjectCodes {
            schematic: clean_code(&answer.fields[0]),
            fitness_fragment: clean_code(&answer.fields[1]),
        })
    }
}
