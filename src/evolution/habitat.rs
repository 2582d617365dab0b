//! 种群容器：Environment 持有的可变状态，按引用显式传给每个 Layer
//!
//! 个体的创建与淘汰只经由这里：批量 setup / reset 通过 WorkerPool 并发执行，
//! 全部完成后才返回（排序与截断之前的屏障）。

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::core::{EvolveError, WorkerPool};
use crate::evolution::individual::Individual;
use crate::evolution::sandbox::ExecutionContext;
use crate::evolution::types::{Artifacts, IndividualId, Layout, Project, Verdict};

/// 待创建的候选：产物快照 + 亲本
#[derive(Debug, Clone)]
pub struct Candidate {
    pub artifacts: Artifacts,
    pub parent_ids: Vec<IndividualId>,
}

pub struct Habitat {
    layout: Layout,
    project: Option<Project>,
    individuals: Vec<Individual>,
    context: Arc<dyn ExecutionContext>,
    pool: WorkerPool,
    rng: StdRng,
    prerequisite: String,
}

impl Habitat {
    pub fn new(
        layout: Layout,
        context: Arc<dyn ExecutionContext>,
        pool: WorkerPool,
        rng: StdRng,
        prerequisite: impl Into<String>,
    ) -> Self {
        Self {
            layout,
            project: None,
            individuals: Vec::new(),
            context,
            pool,
            rng,
            prerequisite: prerequisite.into(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn project(&self) -> Result<&Project, EvolveError> {
        self.project.as_ref().ok_or(EvolveError::ProjectNotInitialized)
    }

    pub(crate) fn set_project(&mut self, project: Project) {
        self.project = Some(project);
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn get(&self, id: IndividualId) -> Option<&Individual> {
        self.individuals.iter().find(|i| i.id() == id)
    }

    pub fn ids(&self) -> Vec<IndividualId> {
        self.individuals.iter().map(Individual::id).collect()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// 同时借出种群（只读）与随机数发生器
    pub fn split(&mut self) -> (&[Individual], &mut StdRng) {
        (&self.individuals, &mut self.rng)
    }

    /// 在依赖清单最前面加上 harness 的前置依赖
    pub fn with_prerequisite(&self, manifest: &str) -> String {
        let body = manifest.trim_start_matches(['\n', '\r']);
        if self.prerequisite.is_empty() {
            return body.to_string();
        }
        if body.trim().is_empty() {
            format!("{}\n", self.prerequisite)
        } else if body.ends_with('\n') {
            format!("{}\n{}", self.prerequisite, body)
        } else {
            format!("{}\n{}\n", self.prerequisite, body)
        }
    }

    /// 创建并 setup 单个个体；setup 失败时返回 None（不重试）
    pub async fn create_individual(
        &mut self,
        artifacts: Artifacts,
        parent_ids: Vec<IndividualId>,
    ) -> Result<Option<IndividualId>, EvolveError> {
        let created = self
            .create_individuals(vec![Candidate {
                artifacts,
                parent_ids,
            }])
            .await?;
        Ok(created.into_iter().next())
    }

    /// 批量创建个体：落盘顺序执行，setup 并发执行；只有 setup 成功的个体按提交顺序加入种群
    pub async fn create_individuals(
        &mut self,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<IndividualId>, EvolveError> {
        self.project()?;

        let mut fresh = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let created = Individual::create(
                &self.layout,
                IndividualId::new(),
                candidate.artifacts,
                candidate.parent_ids,
                self.context.clone(),
            )
            .await;
            match created {
                Ok(individual) => fresh.push(individual),
                Err(e) => {
                    tracing::error!(error = %e, created = fresh.len(), "individual creation failed, burying batch");
                    bury(fresh).await;
                    return Err(e);
                }
            }
        }

        let outcomes = self
            .pool
            .run_all(fresh.into_iter().map(|mut individual| async move {
                let verdict = individual.setup().await;
                (individual, verdict)
            }))
            .await;

        let mut added = Vec::new();
        let mut storage_error = None;
        for (individual, verdict) in outcomes {
            match verdict {
                Ok(Verdict::Survived { fitness }) => {
                    tracing::info!(id = %individual.id(), fitness, "individual joined population");
                    added.push(individual.id());
                    self.individuals.push(individual);
                }
                Ok(Verdict::Culled(_)) => {}
                Err(e) => {
                    tracing::error!(id = %individual.id(), error = %e, "individual setup aborted");
                    storage_error.get_or_insert(e);
                }
            }
        }

        match storage_error {
            Some(e) => Err(e),
            None => Ok(added),
        }
    }

    /// 并发地原地重置若干个体；返回仍存活的个数
    pub async fn reset_individuals(
        &mut self,
        updates: Vec<(IndividualId, Artifacts)>,
    ) -> Result<usize, EvolveError> {
        let mut pending: HashMap<IndividualId, Artifacts> = updates.into_iter().collect();
        let pool = &self.pool;
        let jobs: Vec<_> = self
            .individuals
            .iter_mut()
            .filter_map(|individual| {
                let artifacts = pending.remove(&individual.id())?;
                Some(async move { individual.reset_attributes(artifacts).await })
            })
            .collect();

        let mut survived = 0;
        let mut storage_error = None;
        for verdict in pool.run_all(jobs).await {
            match verdict {
                Ok(v) if v.survived() => survived += 1,
                Ok(_) => {}
                Err(e) => {
                    storage_error.get_or_insert(e);
                }
            }
        }

        match storage_error {
            Some(e) => Err(e),
            None => Ok(survived),
        }
    }

    /// 从活跃种群中移除已死亡的个体
    pub fn reap(&mut self) -> usize {
        let before = self.individuals.len();
        self.individuals.retain(Individual::is_alive);
        before - self.individuals.len()
    }

    /// 按适应度稳定降序排列
    pub fn sort_by_fitness(&mut self) {
        self.individuals
            .sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));
    }

    /// 排序后杀死下标 max_size 之后的所有个体并截断；返回被杀死的 id
    pub async fn cap(&mut self, max_size: usize) -> Result<Vec<IndividualId>, EvolveError> {
        self.sort_by_fitness();
        let mut killed = Vec::new();
        if self.individuals.len() <= max_size {
            return Ok(killed);
        }
        for individual in self.individuals[max_size..].iter_mut() {
            individual.kill().await?;
            killed.push(individual.id());
        }
        self.individuals.truncate(max_size);
        Ok(killed)
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.individuals.first().map(|_| {
            self.individuals
                .iter()
                .map(Individual::fitness)
                .fold(f64::NEG_INFINITY, f64::max)
        })
    }

    pub fn mean_fitness(&self) -> Option<f64> {
        if self.individuals.is_empty() {
            return None;
        }
        let total: f64 = self.individuals.iter().map(Individual::fitness).sum();
        Some(total / self.individuals.len() as f64)
    }
}

/// 把从未 setup 的个体移入 dead_individuals；单个失败只记录
async fn bury(individuals: Vec<Individual>) {
    for mut individual in individuals {
        if let Err(e) = individual.kill().await {
            tracing::warn!(id = %individual.id(), error = %e, "failed to bury unevaluated individual");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::evolution::individual::fake::FakeContext;
    use crate::evolution::types::LifeState;
    use rand::SeedableRng;
    use tempfile::TempDir;

    pub(crate) async fn habitat(dir: &TempDir) -> Habitat {
        let layout = Layout::new(dir.path());
        layout.ensure().await.unwrap();
        tokio::fs::write(layout.harness_path(), "# harness").await.unwrap();
        let mut habitat = Habitat::new(
            layout,
            Arc::new(FakeContext),
            WorkerPool::new(2),
            StdRng::seed_from_u64(7),
            "pytest",
        );
        habitat.set_project(Project {
            prompt: "sort numbers".into(),
            schematic: "def solve(xs): ...".into(),
        });
        habitat
    }

    pub(crate) fn candidate(spec: &str) -> Candidate {
        Candidate {
            artifacts: Artifacts::new(spec, "def solve(xs):\n    return xs\n", "pytest\n"),
            parent_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_only_survivors_in_order() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let added = habitat
            .create_individuals(vec![
                candidate("score=3"),
                candidate("crash"),
                candidate("score=1"),
                candidate("garbage"),
                candidate("score=5"),
            ])
            .await
            .unwrap();

        assert_eq!(added.len(), 3);
        assert_eq!(habitat.ids(), added);
        let fitness: Vec<f64> = habitat.individuals().iter().map(Individual::fitness).collect();
        assert_eq!(fitness, vec![3.0, 1.0, 5.0]);
        // 失败的两个进入冷存储
        assert_eq!(std::fs::read_dir(habitat.layout().graveyard_dir()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_create_requires_project() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        let mut habitat = Habitat::new(
            layout,
            Arc::new(FakeContext),
            WorkerPool::default(),
            StdRng::seed_from_u64(0),
            "pytest",
        );
        let err = habitat
            .create_individual(Artifacts::default(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EvolveError::ProjectNotInitialized));
    }

    #[tokio::test]
    async fn test_with_prerequisite() {
        let dir = TempDir::new().unwrap();
        let habitat = habitat(&dir).await;
        assert_eq!(habitat.with_prerequisite(""), "pytest\n");
        assert_eq!(habitat.with_prerequisite("numpy"), "pytest\nnumpy\n");
        assert_eq!(habitat.with_prerequisite("\nnumpy\nscipy\n"), "pytest\nnumpy\nscipy\n");
    }

    #[tokio::test]
    async fn test_reset_individuals_and_reap() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let ids = habitat
            .create_individuals(vec![candidate("score=1"), candidate("score=2")])
            .await
            .unwrap();

        let survived = habitat
            .reset_individuals(vec![
                (ids[0], Artifacts::new("score=8", "impl", "pytest\n")),
                (ids[1], Artifacts::new("crash", "impl", "pytest\n")),
            ])
            .await
            .unwrap();
        assert_eq!(survived, 1);
        assert_eq!(habitat.get(ids[1]).unwrap().state(), LifeState::Dead);

        assert_eq!(habitat.reap(), 1);
        assert_eq!(habitat.ids(), vec![ids[0]]);
        assert_eq!(habitat.best_fitness(), Some(8.0));
    }

    #[tokio::test]
    async fn test_cap_sorts_before_truncating() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let ids = habitat
            .create_individuals(vec![candidate("score=1"), candidate("score=4"), candidate("score=2")])
            .await
            .unwrap();

        let killed = habitat.cap(2).await.unwrap();
        assert_eq!(killed, vec![ids[0]]);
        assert_eq!(habitat.ids(), vec![ids[1], ids[2]]);
        assert!(habitat.layout().graveyard_dir().join(ids[0].to_string()).exists());
    }

    #[tokio::test]
    async fn test_unevaluated_individuals_are_buried() {
        let dir = TempDir::new().unwrap();
        let habitat = habitat(&dir).await;
        let layout = habitat.layout().clone();
        let mut fresh = Vec::new();
        for spec in ["score=1", "score=2"] {
            let individual = Individual::create(
                &layout,
                IndividualId::new(),
                candidate(spec).artifacts,
                Vec::new(),
                Arc::new(FakeContext),
            )
            .await
            .unwrap();
            fresh.push(individual);
        }
        let ids: Vec<IndividualId> = fresh.iter().map(Individual::id).collect();

        bury(fresh).await;
        assert_eq!(std::fs::read_dir(layout.individuals_dir()).unwrap().count(), 0);
        for id in ids {
            assert!(layout.graveyard_dir().join(id.to_string()).join("data.json").exists());
        }
        assert!(habitat.is_empty());
    }

    #[tokio::test]
    async fn test_fitness_summary() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        assert_eq!(habitat.best_fitness(), None);
        assert_eq!(habitat.mean_fitness(), None);
        habitat
            .create_individuals(vec![candidate("score=1"), candidate("score=3")])
            .await
            .unwrap();
        assert_eq!(habitat.best_fitness(), Some(3.0));
        assert_eq!(habitat.mean_fitness(), Some(2.0));
    }
}
