//! 个体：一个独占沙箱的进化单元
//!
//! 生命周期：create（落盘产物 + 零值结果记录）→ setup（构建运行时、装依赖、装 harness、首次评估）
//! → evaluate_fitness / reset_attributes（原地变异）→ kill（沙箱迁移到冷存储，状态置为 Dead）。
//!
//! 个体级失败不向上传播：setup / evaluate / reset 在失败时杀死个体并返回 `Verdict::Culled`；
//! 只有存储失败（目录已存在、写文件失败、迁移失败）以 `EvolveError::Storage` 返回。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::{EvaluationError, EvolveError, IndividualFailure, SandboxError};
use crate::evolution::sandbox::ExecutionContext;
use crate::evolution::selection::Scored;
use crate::evolution::types::{
    Artifacts, IndividualId, Layout, LifeState, ResultRecord, Verdict, HARNESS_FILE,
    IMPLEMENTATION_FILE, MANIFEST_FILE, RESULT_FILE, SPEC_FILE,
};

pub struct Individual {
    id: IndividualId,
    /// 存活时的沙箱位置 individuals/<id>
    home: PathBuf,
    /// 冷存储位置 dead_individuals/<id>
    graveyard: PathBuf,
    /// 当前所在目录（kill 之后指向冷存储）
    directory: PathBuf,
    harness_source: PathBuf,
    artifacts: Artifacts,
    fitness: f64,
    state: LifeState,
    parent_ids: Vec<IndividualId>,
    record: ResultRecord,
    context: Arc<dyn ExecutionContext>,
}

impl std::fmt::Debug for Individual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Individual")
            .field("id", &self.id)
            .field("fitness", &self.fitness)
            .field("state", &self.state)
            .field("directory", &self.directory)
            .field("parent_ids", &self.parent_ids)
            .finish()
    }
}

impl Individual {
    /// 分配沙箱并写入初始产物与零值结果记录；沙箱目录已存在时返回 Storage 错误
    pub async fn create(
        layout: &Layout,
        id: IndividualId,
        artifacts: Artifacts,
        parent_ids: Vec<IndividualId>,
        context: Arc<dyn ExecutionContext>,
    ) -> Result<Self, EvolveError> {
        let home = layout.individuals_dir().join(id.to_string());
        tokio::fs::create_dir(&home)
            .await
            .map_err(|e| EvolveError::storage(&home, e))?;

        let record = ResultRecord::zeroed(&parent_ids);
        let individual = Self {
            id,
            graveyard: layout.graveyard_dir().join(id.to_string()),
            directory: home.clone(),
            home,
            harness_source: layout.harness_path(),
            artifacts,
            fitness: 0.0,
            state: LifeState::Alive,
            parent_ids,
            record,
            context,
        };
        individual.write_artifacts().await?;
        individual.write_record().await?;
        tracing::debug!(id = %individual.id, dir = %individual.directory.display(), "individual created");
        Ok(individual)
    }

    pub fn id(&self) -> IndividualId {
        self.id
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == LifeState::Alive
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn parent_ids(&self) -> &[IndividualId] {
        &self.parent_ids
    }

    /// 内存中的产物快照（与磁盘内容一致）
    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// 最近一次成功评估读回的结果记录
    pub fn record(&self) -> &ResultRecord {
        &self.record
    }

    /// 构建运行时、安装依赖与 harness，并做首次评估
    pub async fn setup(&mut self) -> Result<Verdict, EvolveError> {
        self.ensure_alive()?;
        if let Err(e) = self.prepare_runtime().await {
            return self.cull(IndividualFailure::Setup(e)).await;
        }
        self.evaluate_fitness().await
    }

    async fn prepare_runtime(&self) -> Result<(), SandboxError> {
        self.context.create(&self.directory).await?;
        self.context
            .install_dependencies(&self.directory, &self.directory.join(MANIFEST_FILE))
            .await?;
        let target = self.directory.join(HARNESS_FILE);
        tokio::fs::copy(&self.harness_source, &target)
            .await
            .map_err(|source| SandboxError::Io { path: target, source })?;
        Ok(())
    }

    /// 在沙箱中运行 harness 并读回结果；失败时适应度归零并杀死个体
    pub async fn evaluate_fitness(&mut self) -> Result<Verdict, EvolveError> {
        self.ensure_alive()?;
        match self.run_evaluation().await {
            Ok(record) => {
                self.fitness = record.score;
                self.record = record;
                tracing::debug!(id = %self.id, fitness = self.fitness, "individual evaluated");
                Ok(Verdict::Survived {
                    fitness: self.fitness,
                })
            }
            Err(e) => self.cull(IndividualFailure::Evaluation(e)).await,
        }
    }

    async fn run_evaluation(&self) -> Result<ResultRecord, EvaluationError> {
        self.context
            .run_harness(&self.directory, &self.directory.join(HARNESS_FILE))
            .await?;

        let path = self.directory.join(RESULT_FILE);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EvaluationError::MissingRecord(path))
            }
            Err(e) => return Err(EvaluationError::MalformedRecord(e.to_string())),
        };
        let record: ResultRecord =
            serde_json::from_str(&raw).map_err(|e| EvaluationError::MalformedRecord(e.to_string()))?;
        if !record.score.is_finite() {
            return Err(EvaluationError::MalformedRecord(format!(
                "non-finite score {}",
                record.score
            )));
        }
        Ok(record)
    }

    /// 原地覆盖产物、重装依赖并重新评估（变异用；交叉总是创建新个体）
    pub async fn reset_attributes(&mut self, artifacts: Artifacts) -> Result<Verdict, EvolveError> {
        self.ensure_alive()?;
        self.artifacts = artifacts;
        self.write_artifacts().await?;

        let manifest = self.directory.join(MANIFEST_FILE);
        if let Err(e) = self.context.install_dependencies(&self.directory, &manifest).await {
            return self.cull(IndividualFailure::Setup(e)).await;
        }
        self.evaluate_fitness().await
    }

    /// 把沙箱迁移到冷存储并标记为 Dead；源目录不存在时（例如第二次调用）返回 Storage 错误
    pub async fn kill(&mut self) -> Result<(), EvolveError> {
        if let Err(e) = self.context.destroy(&self.directory).await {
            tracing::warn!(id = %self.id, error = %e, "failed to release execution context");
        }

        if let Some(parent) = self.graveyard.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EvolveError::storage(parent, e))?;
        }
        tokio::fs::rename(&self.home, &self.graveyard)
            .await
            .map_err(|e| EvolveError::storage(&self.home, e))?;

        self.directory = self.graveyard.clone();
        self.state = LifeState::Dead;
        tracing::debug!(id = %self.id, "individual moved to cold storage");
        Ok(())
    }

    /// 从磁盘读回产物快照
    pub async fn read_artifacts(&self) -> Result<Artifacts, EvolveError> {
        let read = |name: &str| {
            let path = self.directory.join(name);
            async move {
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| EvolveError::storage(&path, e))
            }
        };
        Ok(Artifacts {
            specification: read(SPEC_FILE).await?,
            implementation: read(IMPLEMENTATION_FILE).await?,
            manifest: read(MANIFEST_FILE).await?,
        })
    }

    async fn write_artifacts(&self) -> Result<(), EvolveError> {
        for (name, content) in [
            (SPEC_FILE, &self.artifacts.specification),
            (IMPLEMENTATION_FILE, &self.artifacts.implementation),
            (MANIFEST_FILE, &self.artifacts.manifest),
        ] {
            let path = self.directory.join(name);
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| EvolveError::storage(&path, e))?;
        }
        Ok(())
    }

    async fn write_record(&self) -> Result<(), EvolveError> {
        let path = self.directory.join(RESULT_FILE);
        let json = serde_json::to_string_pretty(&self.record)
            .map_err(|e| EvolveError::storage(&path, std::io::Error::other(e)))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| EvolveError::storage(&path, e))
    }

    /// 个体级失败：记录根因、适应度归零、杀死个体；只有迁移失败会向上传播
    async fn cull(&mut self, failure: IndividualFailure) -> Result<Verdict, EvolveError> {
        tracing::warn!(id = %self.id, error = %failure, "individual culled");
        self.fitness = 0.0;
        self.kill().await?;
        Ok(Verdict::Culled(failure))
    }

    fn ensure_alive(&self) -> Result<(), EvolveError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(EvolveError::IndividualDead(self.id.to_string()))
        }
    }
}

impl Scored for Individual {
    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn genome(&self) -> &str {
        &self.artifacts.specification
    }
}
