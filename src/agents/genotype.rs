//! 基因型协作者：规格 + 图纸 → (实现代码, 依赖清单)

use std::sync::Arc;

use crate::agents::parse::clean_code;
use crate::agents::prompts::{system_prompt, PromptKind};
use crate::agents::{Agent, AgentSettings};
use crate::core::CollaboratorError;
use crate::llm::{CompletionOptions, LlmClient};

/// 由规格生成的实现与依赖
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeCode {
    pub implementation: String,
    pub manifest: String,
}

pub struct GenotypeAgent {
    agent: Agent,
}

impl GenotypeAgent {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            agent: Agent::new(
                llm,
                system_prompt(settings.prompts_dir.as_deref(), PromptKind::Genotype),
                settings.history_turns,
            ),
        }
    }

    pub async fn generate_genotype(
        &self,
        specification: &str,
        schematic: &str,
    ) -> Result<GenotypeCode, CollaboratorError> {
        let message = format!("Implement the following:\n\n{specification}\n\nSchematic:\n{schematic}");
        let answer = self
            .agent
            .answer(
                &message,
                CompletionOptions::with_temperature(0.0),
                &["genotype_py", "requirements_txt"],
            )
            .await?;
        Ok(GenotypeCode {
            implementation: clean_code(&answer.fields[0]),
            manifest: normalize_manifest(&answer.fields[1]),
        })
    }
}

/// 每行一个依赖，去掉空行与代码围栏
fn normalize_manifest(raw: &str) -> String {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("```"))
        .collect();
    if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_manifest() {
        assert_eq!(normalize_manifest("\n numpy \n\n```\nrequests==2.0\n"), "numpy\nrequests==2.0\n");
        assert_eq!(normalize_manifest("   \n"), "");
    }
}
