//! 交叉协作者：两个已掩码的父代规格 → 子代规格
//!
//! 输出中仍残留掩码标记时拒绝（视为生成失败）。

use std::sync::Arc;

use crate::agents::prompts::{system_prompt, PromptKind};
use crate::agents::{Agent, AgentSettings};
use crate::core::CollaboratorError;
use crate::evolution::mask::MASK_TOKEN;
use crate::llm::{CompletionOptions, LlmClient};

pub struct CrossoverAgent {
    agent: Agent,
}

impl CrossoverAgent {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            agent: Agent::new(
                llm,
                system_prompt(settings.prompts_dir.as_deref(), PromptKind::Crossover),
                settings.history_turns,
            ),
        }
    }

    pub async fn crossover(&self, masked_a: &str, masked_b: &str) -> Result<String, CollaboratorError> {
        let message = format!(
            "1. Parent prompt 1 with masked sections:\n{masked_a}\n\n\
             2. Parent prompt 2 with masked sections:\n{masked_b}\n\n\
             Please combine the prompts using the unmasked sections as a guide."
        );
        let answer = self
            .agent
            .answer(&message, CompletionOptions::with_temperature(0.0), &["child_prompt"])
            .await?;
        let child = answer.fields[0].trim().to_string();
        if child.contains(MASK_TOKEN) {
            return Err(CollaboratorError::MaskMarkerPresent(MASK_TOKEN.to_string()));
        }
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_rejects_residual_mask() {
        let llm = Arc::new(MockLlmClient::with_responder(|_| {
            "<child_prompt>sort the [MASK] list</child_prompt>".to_string()
        }));
        let agent = CrossoverAgent::new(llm, &AgentSettings::default());
        let err = agent.crossover("a [MASK]", "[MASK] b").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::MaskMarkerPresent(_)));
    }

    #[tokio::test]
    async fn test_accepts_complete_child() {
        let llm = Arc::new(MockLlmClient::with_responder(|messages| {
            let last = &messages[messages.len() - 1].content;
            assert!(last.contains("Parent prompt 1"));
            assert!(last.contains("alpha [MASK]"));
            "<child_prompt>\n merged spec \n</child_prompt>".to_string()
        }));
        let agent = CrossoverAgent::new(llm, &AgentSettings::default());
        assert_eq!(agent.crossover("alpha [MASK]", "beta").await.unwrap(), "merged spec");
    }
}
