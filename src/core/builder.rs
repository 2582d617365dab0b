//! Environment 构建器：统一从 AppConfig 组装 LLM、执行上下文、协作者与流水线
//!
//! 二进制与集成测试共用同一套装配逻辑；测试可以注入 Mock LLM 与假执行上下文。

use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agents::{AgentSettings, Collaborators, HARNESS_TEMPLATE};
use crate::config::AppConfig;
use crate::core::{EvolveError, WorkerPool};
use crate::evolution::{presets, Environment, ExecutionContext, Habitat, Layer, Layout, VenvContext};
use crate::llm::{create_llm_from_config, LlmClient};

type PipelineFactory = Box<dyn FnOnce(&Collaborators) -> Vec<Box<dyn Layer>> + Send>;

pub struct EnvironmentBuilder {
    config: AppConfig,
    workspace: PathBuf,
    llm: Option<Arc<dyn LlmClient>>,
    context: Option<Arc<dyn ExecutionContext>>,
    pipeline: Option<PipelineFactory>,
}

impl EnvironmentBuilder {
    pub fn new(config: AppConfig) -> Self {
        let workspace = config.app.workspace();
        Self {
            config,
            workspace,
            llm: None,
            context: None,
            pipeline: None,
        }
    }

    /// 覆盖工作目录（environment/ 建在其下）
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// 自定义流水线；未设置时使用 general 预设
    pub fn with_pipeline<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&Collaborators) -> Vec<Box<dyn Layer>> + Send + 'static,
    {
        self.pipeline = Some(Box::new(factory));
        self
    }

    pub fn build_llm(&self) -> Arc<dyn LlmClient> {
        self.llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config.llm))
    }

    pub fn build_context(&self) -> Arc<dyn ExecutionContext> {
        self.context
            .clone()
            .unwrap_or_else(|| Arc::new(VenvContext::from(&self.config.sandbox)))
    }

    /// 固定种子时可复现选择与掩码
    pub fn build_rng(&self) -> StdRng {
        match self.config.evolution.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// 读取 harness 模板：配置了路径则读文件，否则用内置模板
    pub fn load_harness_template(&self) -> Result<String, EvolveError> {
        match &self.config.sandbox.harness_template {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                EvolveError::Config(format!("failed to read harness template {}: {e}", path.display()))
            }),
            None => Ok(HARNESS_TEMPLATE.to_string()),
        }
    }

    pub fn build(self) -> Result<Environment, EvolveError> {
        let harness_template = self.load_harness_template()?;
        let llm = self.build_llm();
        let context = self.build_context();
        let rng = self.build_rng();
        let collaborators = Collaborators::new(llm, &AgentSettings::from(&self.config));

        let layers = match self.pipeline {
            Some(factory) => factory(&collaborators),
            None => presets::general_from_config(&collaborators, &self.config.evolution),
        };

        let habitat = Habitat::new(
            Layout::new(&self.workspace),
            context,
            WorkerPool::new(self.config.evolution.max_concurrent_evaluations),
            rng,
            self.config.sandbox.harness_prerequisite.clone(),
        );
        tracing::debug!(workspace = %self.workspace.display(), layers = layers.len(), "environment assembled");

        Ok(Environment::new(habitat, collaborators.project.clone(), harness_template)
            .with_judge(collaborators.tournament.clone())
            .with_layers(layers))
    }
}
