//! 评审协作者：在若干候选规格中挑出最有希望的一个

use std::sync::Arc;

use crate::agents::prompts::{system_prompt, PromptKind};
use crate::agents::{Agent, AgentSettings};
use crate::core::CollaboratorError;
use crate::llm::{CompletionOptions, LlmClient};

pub struct TournamentAgent {
    agent: Agent,
}

impl TournamentAgent {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            agent: Agent::new(
                llm,
                system_prompt(settings.prompts_dir.as_deref(), PromptKind::Tournament),
                settings.history_turns,
            ),
        }
    }

    /// 返回胜出者的下标；回答无法对应到任何候选时视为缺少字段
    pub async fn judge(&self, problem: &str, candidates: &[String]) -> Result<usize, CollaboratorError> {
        if candidates.len() <= 1 {
            return Ok(0);
        }

        let mut message = format!("Here are some prompts to solve the problem, '{problem}':\n");
        for (i, candidate) in candidates.iter().enumerate() {
            message.push_str(&format!("<example name=\"example_{i}\">\n{candidate}\n</example>\n"));
        }
        message.push_str(&format!("\nHere is the problem prompt:\n{problem}"));

        let answer = self
            .agent
            .answer(&message, CompletionOptions::with_temperature(0.0), &["selection"])
            .await?;
        resolve(answer.fields[0].trim(), candidates)
            .ok_or_else(|| CollaboratorError::MissingField("selection".to_string()))
    }
}

/// `example_N`、裸数字或候选原文都可以
fn resolve(selection: &str, candidates: &[String]) -> Option<usize> {
    let name = selection.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
    name.strip_prefix("example_")
        .unwrap_or(name)
        .parse::<usize>()
        .ok()
        .filter(|i| *i < candidates.len())
        .or_else(|| candidates.iter().position(|c| c.trim() == name))
}
