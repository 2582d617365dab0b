//! 协作者系统提示词：内置一份，可被 prompts 目录下的同名文件覆盖

use std::path::Path;

/// 协作者种类（对应 prompts/<kind>.md）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Project,
    Phenotype,
    Genotype,
    Crossover,
    Mutation,
    Telephone,
    Tournament,
}

impl PromptKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PromptKind::Project => "project.md",
            PromptKind::Phenotype => "phenotype.md",
            PromptKind::Genotype => "genotype.md",
            PromptKind::Crossover => "crossover.md",
            PromptKind::Mutation => "mutation.md",
            PromptKind::Telephone => "telephone.md",
            PromptKind::Tournament => "tournament.md",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            PromptKind::Project => include_str!("../../prompts/project.md"),
            PromptKind::Phenotype => include_str!("../../prompts/phenotype.md"),
            PromptKind::Genotype => include_str!("../../prompts/genotype.md"),
            PromptKind::Crossover => include_str!("../../prompts/crossover.md"),
            PromptKind::Mutation => include_str!("../../prompts/mutation.md"),
            PromptKind::Telephone => include_str!("../../prompts/telephone.md"),
            PromptKind::Tournament => include_str!("../../prompts/tournament.md"),
        }
    }
}

/// 读取系统提示词：dir/<kind>.md 存在且非空则用之，否则用内置版本
pub fn system_prompt(dir: Option<&Path>, kind: PromptKind) -> String {
    dir.map(|d| d.join(kind.file_name()))
        .and_then(|p| std::fs::read_to_string(p).ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| kind.builtin().to_string())
}

/// 内置 harness 模板（含唯一的 `{generated_fitness_code}` 占位符）
pub const HARNESS_TEMPLATE: &str = include_str!("../../prompts/harness_template.py");
