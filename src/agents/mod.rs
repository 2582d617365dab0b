//! 生成式协作者：项目 / 表型 / 基因型 / 交叉 / 变异 / 传话 / 评审
//!
//! 每个协作者都是一个带系统提示词与对话历史的 Agent，输出通过 XML 风格标签抽取字段。

pub mod agent;
pub mod crossover;
pub mod genotype;
pub mod mutation;
pub mod parse;
pub mod phenotype;
pub mod project;
pub mod prompts;
pub mod telephone;
pub mod tournament;

use std::path::PathBuf;
use std::sync::Arc;

pub use agent::{Agent, Answer};
pub use crossover::CrossoverAgent;
pub use genotype::{GenotypeAgent, GenotypeCode};
pub use mutation::MutationAgent;
pub use parse::{clean_code, parse_tag};
pub use phenotype::PhenotypeAgent;
pub use project::{ProjectAgent, ProjectCodes};
pub use prompts::{PromptKind, HARNESS_TEMPLATE};
pub use telephone::TelephoneAgent;
pub use tournament::TournamentAgent;

use crate::config::AppConfig;
use crate::llm::LlmClient;

/// 协作者公共设置
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub prompts_dir: Option<PathBuf>,
    pub history_turns: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            prompts_dir: None,
            history_turns: 4,
        }
    }
}

impl From<&AppConfig> for AgentSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            prompts_dir: cfg.app.prompts_dir.clone(),
            history_turns: cfg.evolution.history_turns,
        }
    }
}

/// 一整套协作者（共享同一个 LLM 客户端）
#[derive(Clone)]
pub struct Collaborators {
    pub project: Arc<ProjectAgent>,
    pub phenotype: Arc<PhenotypeAgent>,
    pub genotype: Arc<GenotypeAgent>,
    pub crossover: Arc<CrossoverAgent>,
    pub mutation: Arc<MutationAgent>,
    pub telephone: Arc<TelephoneAgent>,
    pub tournament: Arc<TournamentAgent>,
}

impl Collaborators {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &AgentSettings) -> Self {
        Self {
            project: Arc::new(ProjectAgent::new(llm.clone(), settings)),
            phenotype: Arc::new(PhenotypeAgent::new(llm.clone(), settings)),
            genotype: Arc::new(GenotypeAgent::new(llm.clone(), settings)),
            crossover: Arc::new(CrossoverAgent::new(llm.clone(), settings)),
            mutation: Arc::new(MutationAgent::new(llm.clone(), settings)),
            telephone: Arc::new(TelephoneAgent::new(llm.clone(), settings)),
            tournament: Arc::new(TournamentAgent::new(llm, settings)),
        }
    }
}
