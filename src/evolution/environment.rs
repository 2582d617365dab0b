//! 进化环境：持有种群、项目级产物与有序流水线，逐代驱动各层
//!
//! 调用顺序：init_project → compile → evolve。每代依次执行所有层（层与层之间检查取消），
//! 结束后追加一个历史样本（代后种群的最佳适应度，空种群记 0）并落盘 history.json。

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::agents::{ProjectAgent, TournamentAgent};
use crate::core::EvolveError;
use crate::evolution::habitat::Habitat;
use crate::evolution::individual::Individual;
use crate::evolution::layers::{run_layer, Layer};
use crate::evolution::selection::ranked_indices;
use crate::evolution::types::{Artifacts, GenerationReport, IndividualId, Layout, Project};

/// harness 模板中唯一的替换点
pub const FITNESS_MARKER: &str = "{generated_fitness_code}";

/// history.json 的内容
#[derive(Serialize)]
struct HistoryFile<'a> {
    history: &'a [f64],
    generations: &'a [GenerationReport],
}

pub struct Environment {
    habitat: Habitat,
    project_agent: Arc<ProjectAgent>,
    judge: Option<Arc<TournamentAgent>>,
    harness_template: String,
    layers: Vec<Box<dyn Layer>>,
    compiled: bool,
    history: Vec<f64>,
    reports: Vec<GenerationReport>,
    cancel: CancellationToken,
}

impl Environment {
    pub fn new(habitat: Habitat, project_agent: Arc<ProjectAgent>, harness_template: impl Into<String>) -> Self {
        Self {
            habitat,
            project_agent,
            judge: None,
            harness_template: harness_template.into(),
            layers: Vec::new(),
            compiled: false,
            history: Vec::new(),
            reports: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// 追加一层；流水线需要重新 compile
    pub fn add_layer(&mut self, layer: Box<dyn Layer>) -> &mut Self {
        self.layers.push(layer);
        self.compiled = false;
        self
    }

    pub fn with_layers(mut self, layers: Vec<Box<dyn Layer>>) -> Self {
        self.layers.extend(layers);
        self.compiled = false;
        self
    }

    /// 设置评审协作者；未设置时 champion 等同于 best
    pub fn with_judge(mut self, judge: Arc<TournamentAgent>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn layout(&self) -> &Layout {
        self.habitat.layout()
    }

    pub fn project(&self) -> Option<&Project> {
        self.habitat.project().ok()
    }

    pub fn population(&self) -> &[Individual] {
        self.habitat.individuals()
    }

    pub fn best(&self) -> Option<&Individual> {
        self.population()
            .iter()
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
    }

    /// 适应度前 finalists 名中由评审协作者挑出的冠军；评审失败时退回适应度最高者
    pub async fn champion(&self, finalists: usize) -> Option<&Individual> {
        let population = self.population();
        let shortlist: Vec<&Individual> = ranked_indices(population)
            .into_iter()
            .take(finalists.max(1))
            .map(|i| &population[i])
            .collect();
        let best = shortlist.first().copied()?;
        let (Some(judge), Some(project)) = (&self.judge, self.project()) else {
            return Some(best);
        };

        let specifications: Vec<String> = shortlist
            .iter()
            .map(|i| i.artifacts().specification.clone())
            .collect();
        match judge.judge(&project.prompt, &specifications).await {
            Ok(winner) => shortlist.get(winner).copied().or(Some(best)),
            Err(e) => {
                tracing::warn!(error = %e, "tournament judging failed, falling back to best fitness");
                Some(best)
            }
        }
    }

    /// 每代一个样本（只追加）
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn reports(&self) -> &[GenerationReport] {
        &self.reports
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// 共享 LLM 客户端的累计 token 用量：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.project_agent.token_usage()
    }

    /// 取消句柄：在层与层之间生效
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 一次性初始化：向项目协作者索取图纸与适应度片段，合并进 harness 模板并落盘
    pub async fn init_project(&mut self, prompt: &str) -> Result<&Project, EvolveError> {
        let markers = self.harness_template.matches(FITNESS_MARKER).count();
        if markers != 1 {
            return Err(EvolveError::Config(format!(
                "harness template must contain exactly one {FITNESS_MARKER} marker, found {markers}"
            )));
        }

        let codes = self.project_agent.generate_project_codes(prompt).await?;

        let layout = self.habitat.layout().clone();
        layout.ensure().await?;
        let schematic_path = layout.schematic_path();
        tokio::fs::write(&schematic_path, &codes.schematic)
            .await
            .map_err(|e| EvolveError::storage(&schematic_path, e))?;

        let harness_path = layout.harness_path();
        let harness = self
            .harness_template
            .replacen(FITNESS_MARKER, &codes.fitness_fragment, 1);
        tokio::fs::write(&harness_path, harness)
            .await
            .map_err(|e| EvolveError::storage(&harness_path, e))?;

        tracing::info!(root = %layout.root().display(), "project initialized");
        self.habitat.set_project(Project {
            prompt: prompt.to_string(),
            schematic: codes.schematic,
        });
        self.habitat.project()
    }

    /// 校验所有层；evolve 之前必须调用
    pub fn compile(&mut self) -> Result<(), EvolveError> {
        for layer in &self.layers {
            layer.validate()?;
        }
        self.compiled = true;
        tracing::debug!(layers = ?self.layer_names(), "pipeline compiled");
        Ok(())
    }

    /// 创建个体（清单前自动加上 harness 前置依赖）；setup 失败时返回 None
    pub async fn create_individual(
        &mut self,
        specification: &str,
        implementation: &str,
        manifest: &str,
    ) -> Result<Option<IndividualId>, EvolveError> {
        let manifest = self.habitat.with_prerequisite(manifest);
        self.habitat
            .create_individual(Artifacts::new(specification, implementation, manifest), Vec::new())
            .await
    }

    /// 运行若干代；返回完整的历史
    pub async fn evolve(&mut self, generations: usize) -> Result<&[f64], EvolveError> {
        if !self.compiled {
            return Err(EvolveError::NotCompiled);
        }
        self.habitat.project()?;

        for _ in 0..generations {
            let generation = self.history.len() + 1;
            tracing::info!(generation, population = self.habitat.len(), "generation started");

            for layer in &self.layers {
                if self.cancel.is_cancelled() {
                    tracing::warn!(generation, layer = layer.name(), "evolution cancelled");
                    return Err(EvolveError::Cancelled);
                }
                run_layer(layer.as_ref(), &mut self.habitat).await?;
            }

            self.record_generation(generation).await?;
        }
        Ok(&self.history)
    }

    async fn record_generation(&mut self, generation: usize) -> Result<(), EvolveError> {
        let best = self.habitat.best_fitness().unwrap_or(0.0);
        let report = GenerationReport {
            generation,
            best,
            mean: self.habitat.mean_fitness().unwrap_or(0.0),
            population: self.habitat.len(),
            finished_at: chrono::Utc::now(),
        };
        tracing::info!(
            generation,
            best = report.best,
            mean = report.mean,
            population = report.population,
            "generation finished"
        );
        self.history.push(best);
        self.reports.push(report);

        let path = self.habitat.layout().history_path();
        let json = serde_json::to_string_pretty(&HistoryFile {
            history: &self.history,
            generations: &self.reports,
        })
        .map_err(|e| EvolveError::storage(&path, std::io::Error::other(e)))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| EvolveError::storage(&path, e))
    }
}
