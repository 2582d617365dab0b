use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{EvolveError, IndividualFailure};

/// 沙箱内的文件布局
pub const SPEC_FILE: &str = "phenotype.md";
pub const IMPLEMENTATION_FILE: &str = "genotype.py";
pub const MANIFEST_FILE: &str = "requirements.txt";
pub const RESULT_FILE: &str = "data.json";
pub const HARNESS_FILE: &str = "fitness.py";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndividualId(Uuid);

impl IndividualId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IndividualId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IndividualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeState {
    Alive,
    Dead,
}

/// 个体的产物快照：规格（表型）、实现（基因型）、依赖清单
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Artifacts {
    pub specification: String,
    pub implementation: String,
    pub manifest: String,
}

impl Artifacts {
    pub fn new(
        specification: impl Into<String>,
        implementation: impl Into<String>,
        manifest: impl Into<String>,
    ) -> Self {
        Self {
            specification: specification.into(),
            implementation: implementation.into(),
            manifest: manifest.into(),
        }
    }
}

/// harness 写出、evaluate_fitness 读回的结果记录
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultRecord {
    pub score: f64,
    pub iteration: u64,
    pub runtimes: Vec<f64>,
    pub parent_ids: Vec<String>,
}

impl ResultRecord {
    pub fn zeroed(parents: &[IndividualId]) -> Self {
        Self {
            parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// setup / evaluate / reset 的显式结果：存活（带适应度）或被淘汰（带原因）
#[derive(Debug)]
pub enum Verdict {
    Survived { fitness: f64 },
    Culled(IndividualFailure),
}

impl Verdict {
    pub fn survived(&self) -> bool {
        matches!(self, Verdict::Survived { .. })
    }
}

/// 项目级存储布局：<workspace>/environment/{individuals, dead_individuals, schematic.md, fitness.py, history.json}
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        Self {
            root: workspace.as_ref().join("environment"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn individuals_dir(&self) -> PathBuf {
        self.root.join("individuals")
    }

    /// 冷存储：被杀死的个体迁移到这里，从不删除
    pub fn graveyard_dir(&self) -> PathBuf {
        self.root.join("dead_individuals")
    }

    pub fn schematic_path(&self) -> PathBuf {
        self.root.join("schematic.md")
    }

    pub fn harness_path(&self) -> PathBuf {
        self.root.join(HARNESS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join("history.json")
    }

    pub async fn ensure(&self) -> Result<(), EvolveError> {
        for dir in [self.root.clone(), self.individuals_dir(), self.graveyard_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| EvolveError::storage(&dir, e))?;
        }
        Ok(())
    }
}

/// 项目级产物（init_project 之后可用）
#[derive(Debug, Clone)]
pub struct Project {
    pub prompt: String,
    pub schematic: String,
}

/// 每代结束时的种群摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: usize,
    pub best: f64,
    pub mean: f64,
    pub population: usize,
    pub finished_at: DateTime<Utc>,
}
