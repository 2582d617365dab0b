//! 流水线层：每层 = 选择（只读）+ 算子（经由 Habitat 修改种群）
//!
//! `run_layer` 是唯一的执行入口：select → apply → reap。Layer 不保存对 Environment 的引用，
//! 种群以 `&mut Habitat` 显式传入。协作者失败只跳过当前候选（warn），存储失败向上传播。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;

use crate::agents::{CrossoverAgent, GenotypeAgent, MutationAgent, PhenotypeAgent, TelephoneAgent};
use crate::core::EvolveError;
use crate::evolution::habitat::{Candidate, Habitat};
use crate::evolution::individual::Individual;
use crate::evolution::mask::MaskConfig;
use crate::evolution::selection::{parent_pairs, Selection};
use crate::evolution::types::{Artifacts, IndividualId};

#[async_trait]
pub trait Layer: Send + Sync {
    fn name(&self) -> &str;

    /// compile 与 run_layer 都会调用：参数不合法的层在执行任何算子前失败
    fn validate(&self) -> Result<(), EvolveError> {
        Ok(())
    }

    /// 选择下标（不修改任何状态）；默认整个种群
    fn select(&self, population: &[Individual], _rng: &mut StdRng) -> Vec<usize> {
        (0..population.len()).collect()
    }

    async fn apply(&self, habitat: &mut Habitat, selected: Vec<IndividualId>) -> Result<(), EvolveError>;
}

/// 执行一层：校验 → 选择 → 算子 → 清理死亡个体
pub async fn run_layer(layer: &dyn Layer, habitat: &mut Habitat) -> Result<(), EvolveError> {
    layer.validate()?;
    let selected: Vec<IndividualId> = {
        let (population, rng) = habitat.split();
        layer
            .select(population, rng)
            .into_iter()
            .map(|i| population[i].id())
            .collect()
    };
    tracing::debug!(layer = layer.name(), selected = selected.len(), "running layer");

    layer.apply(habitat, selected).await?;

    let reaped = habitat.reap();
    tracing::info!(
        layer = layer.name(),
        population = habitat.len(),
        reaped,
        "layer finished"
    );
    Ok(())
}

/// 由规格生成实现，组成一个待创建的候选；协作者失败时记录并返回 None
async fn realize(
    genotype: &GenotypeAgent,
    habitat: &Habitat,
    layer: &str,
    specification: String,
) -> Result<Option<Artifacts>, EvolveError> {
    let schematic = &habitat.project()?.schematic;
    match genotype.generate_genotype(&specification, schematic).await {
        Ok(code) => {
            let manifest = habitat.with_prerequisite(&code.manifest);
            Ok(Some(Artifacts::new(specification, code.implementation, manifest)))
        }
        Err(e) => {
            tracing::warn!(layer, error = %e, "genotype generation failed, skipping candidate");
            Ok(None)
        }
    }
}

fn specification_of(habitat: &Habitat, id: IndividualId) -> Result<String, EvolveError> {
    habitat
        .get(id)
        .map(|i| i.artifacts().specification.clone())
        .ok_or_else(|| EvolveError::IndividualDead(id.to_string()))
}

/// 反复生成规格与实现并创建个体，直到种群达到 target_size 或尝试预算用尽
pub struct Populate {
    phenotype: Arc<PhenotypeAgent>,
    genotype: Arc<GenotypeAgent>,
    target_size: usize,
    max_attempts: usize,
}

impl Populate {
    pub fn new(phenotype: Arc<PhenotypeAgent>, genotype: Arc<GenotypeAgent>, target_size: usize) -> Self {
        Self {
            phenotype,
            genotype,
            target_size,
            max_attempts: target_size.saturating_mul(4),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[async_trait]
impl Layer for Populate {
    fn name(&self) -> &str {
        "populate"
    }

    fn validate(&self) -> Result<(), EvolveError> {
        if self.max_attempts < self.target_size {
            return Err(EvolveError::invalid_layer(
                self.name(),
                format!(
                    "attempt budget {} below target size {}",
                    self.max_attempts, self.target_size
                ),
            ));
        }
        Ok(())
    }

    fn select(&self, _population: &[Individual], _rng: &mut StdRng) -> Vec<usize> {
        Vec::new()
    }

    async fn apply(&self, habitat: &mut Habitat, _selected: Vec<IndividualId>) -> Result<(), EvolveError> {
        let problem = habitat.project()?.prompt.clone();
        let mut attempts = 0;

        while habitat.len() < self.target_size && attempts < self.max_attempts {
            let wanted = (self.target_size - habitat.len()).min(self.max_attempts - attempts);
            let mut batch = Vec::with_capacity(wanted);
            for _ in 0..wanted {
                attempts += 1;
                let specification = match self.phenotype.generate_phenotype(&problem).await {
                    Ok(spec) => spec,
                    Err(e) => {
                        tracing::warn!(layer = self.name(), error = %e, "phenotype generation failed, skipping candidate");
                        continue;
                    }
                };
                if let Some(artifacts) = realize(&self.genotype, habitat, self.name(), specification).await? {
                    batch.push(Candidate {
                        artifacts,
                        parent_ids: Vec::new(),
                    });
                }
            }
            habitat.create_individuals(batch).await?;
        }

        if habitat.len() < self.target_size {
            tracing::warn!(
                layer = self.name(),
                population = habitat.len(),
                target = self.target_size,
                attempts,
                "attempt budget exhausted before reaching target size"
            );
        }
        Ok(())
    }
}

/// 掩码交叉：两个父代的规格分别掩码后交给交叉协作者，子代总是新个体，父代保留
pub struct MaskedCrossover {
    crossover: Arc<CrossoverAgent>,
    genotype: Arc<GenotypeAgent>,
    selection: Selection,
    num_families: usize,
    num_children: usize,
    mask: MaskConfig,
}

impl MaskedCrossover {
    pub fn new(
        crossover: Arc<CrossoverAgent>,
        genotype: Arc<GenotypeAgent>,
        selection: Selection,
        num_families: usize,
        num_children: usize,
    ) -> Self {
        Self {
            crossover,
            genotype,
            selection,
            num_families,
            num_children,
            mask: MaskConfig::default(),
        }
    }

    pub fn with_mask(mut self, mask: MaskConfig) -> Self {
        self.mask = mask;
        self
    }
}

#[async_trait]
impl Layer for MaskedCrossover {
    fn name(&self) -> &str {
        "masked_crossover"
    }

    fn validate(&self) -> Result<(), EvolveError> {
        self.mask.validate(self.name())
    }

    /// 恰好两个父代；只选出一个时与自身配对
    fn select(&self, population: &[Individual], rng: &mut StdRng) -> Vec<usize> {
        parent_pairs(&self.selection, population, 1, rng)
            .into_iter()
            .flat_map(|(a, b)| [a, b])
            .collect()
    }

    async fn apply(&self, habitat: &mut Habitat, selected: Vec<IndividualId>) -> Result<(), EvolveError> {
        let [first, second] = match selected.as_slice() {
            [a, b, ..] => [*a, *b],
            _ => return Ok(()),
        };
        let (spec_a, spec_b) = (specification_of(habitat, first)?, specification_of(habitat, second)?);
        let mut parents = vec![first];
        if second != first {
            parents.push(second);
        }

        let mut batch = Vec::new();
        for family in 0..self.num_families {
            for child in 0..self.num_children {
                let masked_a = self.mask.apply(&spec_a, habitat.rng());
                let masked_b = self.mask.apply(&spec_b, habitat.rng());
                let specification = match self.crossover.crossover(&masked_a, &masked_b).await {
                    Ok(spec) => spec,
                    Err(e) => {
                        tracing::warn!(layer = self.name(), family, child, error = %e, "crossover failed, skipping child");
                        continue;
                    }
                };
                if let Some(artifacts) =
                    realize(&self.genotype, habitat, self.name(), specification).await?
                {
                    batch.push(Candidate {
                        artifacts,
                        parent_ids: parents.clone(),
                    });
                }
            }
        }

        let born = habitat.create_individuals(batch).await?;
        tracing::info!(layer = self.name(), children = born.len(), "crossover produced children");
        Ok(())
    }
}

/// 掩码变异：规格掩码 → 协作者补全 → 重新生成实现 → 原地 reset（不产生新个体）
pub struct MaskedMutation {
    mutation: Arc<MutationAgent>,
    genotype: Arc<GenotypeAgent>,
    selection: Selection,
    mask: MaskConfig,
}

impl MaskedMutation {
    pub fn new(mutation: Arc<MutationAgent>, genotype: Arc<GenotypeAgent>, selection: Selection) -> Self {
        Self {
            mutation,
            genotype,
            selection,
            mask: MaskConfig::default(),
        }
    }

    pub fn with_mask(mut self, mask: MaskConfig) -> Self {
        self.mask = mask;
        self
    }
}

#[async_trait]
impl Layer for MaskedMutation {
    fn name(&self) -> &str {
        "masked_mutation"
    }

    fn validate(&self) -> Result<(), EvolveError> {
        self.mask.validate(self.name())
    }

    /// 有放回的选择可能重复，同一个体每轮只变异一次
    fn select(&self, population: &[Individual], rng: &mut StdRng) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.selection
            .select(population, rng)
            .into_iter()
            .filter(|i| seen.insert(*i))
            .collect()
    }

    async fn apply(&self, habitat: &mut Habitat, selected: Vec<IndividualId>) -> Result<(), EvolveError> {
        let mut updates = Vec::with_capacity(selected.len());
        for id in selected {
            let Some(original) = habitat.get(id).map(|i| i.artifacts().specification.clone()) else {
                continue;
            };
            let masked = self.mask.apply(&original, habitat.rng());
            let specification = match self.mutation.unmask(&masked).await {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!(layer = self.name(), id = %id, error = %e, "mutation failed, skipping individual");
                    continue;
                }
            };
            if let Some(artifacts) = realize(&self.genotype, habitat, self.name(), specification).await? {
                updates.push((id, artifacts));
            }
        }

        let survived = habitat.reset_individuals(updates).await?;
        tracing::info!(layer = self.name(), survived, "mutation pass finished");
        Ok(())
    }
}

/// 传话变异：由实现代码反推规格 → 重新生成实现 → 原地 reset
pub struct TelephoneMutation {
    telephone: Arc<TelephoneAgent>,
    genotype: Arc<GenotypeAgent>,
    selection: Selection,
}

impl TelephoneMutation {
    pub fn new(telephone: Arc<TelephoneAgent>, genotype: Arc<GenotypeAgent>, selection: Selection) -> Self {
        Self {
            telephone,
            genotype,
            selection,
        }
    }
}

#[async_trait]
impl Layer for TelephoneMutation {
    fn name(&self) -> &str {
        "telephone_mutation"
    }

    fn select(&self, population: &[Individual], rng: &mut StdRng) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.selection
            .select(population, rng)
            .into_iter()
            .filter(|i| seen.insert(*i))
            .collect()
    }

    async fn apply(&self, habitat: &mut Habitat, selected: Vec<IndividualId>) -> Result<(), EvolveError> {
        let mut updates = Vec::with_capacity(selected.len());
        for id in selected {
            let Some(code) = habitat.get(id).map(|i| i.artifacts().implementation.clone()) else {
                continue;
            };
            let specification = match self.telephone.describe(&code).await {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!(layer = self.name(), id = %id, error = %e, "telephone failed, skipping individual");
                    continue;
                }
            };
            if let Some(artifacts) = realize(&self.genotype, habitat, self.name(), specification).await? {
                updates.push((id, artifacts));
            }
        }

        let survived = habitat.reset_individuals(updates).await?;
        tracing::info!(layer = self.name(), survived, "telephone pass finished");
        Ok(())
    }
}

/// 按适应度稳定降序排序
#[derive(Debug, Default)]
pub struct SortByFitness;

#[async_trait]
impl Layer for SortByFitness {
    fn name(&self) -> &str {
        "sort_by_fitness"
    }

    async fn apply(&self, habitat: &mut Habitat, _selected: Vec<IndividualId>) -> Result<(), EvolveError> {
        habitat.sort_by_fitness();
        Ok(())
    }
}

/// 截断种群：先稳定排序，再杀死 max_size 之后的个体（max_size = 0 淘汰全部）
#[derive(Debug)]
pub struct CapPopulation {
    max_size: usize,
}

impl CapPopulation {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }
}

#[async_trait]
impl Layer for CapPopulation {
    fn name(&self) -> &str {
        "cap_population"
    }

    async fn apply(&self, habitat: &mut Habitat, _selected: Vec<IndividualId>) -> Result<(), EvolveError> {
        let killed = habitat.cap(self.max_size).await?;
        if !killed.is_empty() {
            tracing::info!(layer = self.name(), killed = killed.len(), "population capped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentSettings;
    use crate::evolution::habitat::tests::{candidate, habitat};
    use crate::evolution::types::LifeState;
    use crate::llm::MockLlmClient;
    use crate::memory::Message;
    use tempfile::TempDir;

    fn scripted(responder: fn(&str) -> String) -> Arc<MockLlmClient> {
        Arc::new(MockLlmClient::with_responder(move |messages: &[Message]| {
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            responder(last)
        }))
    }

    fn genotype_reply() -> String {
        "<genotype_py>def solve(xs):\n    return sorted(xs)\n</genotype_py><requirements_txt></requirements_txt>".into()
    }

    #[tokio::test]
    async fn test_sort_by_fitness_is_stable() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let ids = habitat
            .create_individuals(vec![
                candidate("first score=2"),
                candidate("second score=5"),
                candidate("third score=2"),
                candidate("fourth score=5"),
            ])
            .await
            .unwrap();

        run_layer(&SortByFitness, &mut habitat).await.unwrap();
        assert_eq!(habitat.ids(), vec![ids[1], ids[3], ids[0], ids[2]]);
    }

    #[tokio::test]
    async fn test_sort_then_cap_example() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let ids = habitat
            .create_individuals(vec![candidate("A score=3"), candidate("B score=1"), candidate("C score=5")])
            .await
            .unwrap();
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        run_layer(&SortByFitness, &mut habitat).await.unwrap();
        assert_eq!(habitat.ids(), vec![c, a, b]);

        run_layer(&CapPopulation::new(2), &mut habitat).await.unwrap();
        assert_eq!(habitat.ids(), vec![c, a]);
        assert!(habitat.layout().graveyard_dir().join(b.to_string()).exists());
        assert!(!habitat.layout().individuals_dir().join(b.to_string()).exists());
    }

    #[tokio::test]
    async fn test_cap_on_unsorted_population_keeps_best() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        habitat
            .create_individuals(
                [4.0, 9.0, 1.0, 7.0, 3.0]
                    .iter()
                    .map(|s| candidate(&format!("score={s}")))
                    .collect(),
            )
            .await
            .unwrap();

        run_layer(&CapPopulation::new(3), &mut habitat).await.unwrap();
        let fitness: Vec<f64> = habitat.individuals().iter().map(Individual::fitness).collect();
        assert_eq!(fitness, vec![9.0, 7.0, 4.0]);
        assert_eq!(std::fs::read_dir(habitat.layout().graveyard_dir()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_telephone_mutation_rewrites_specification_from_code() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let ids = habitat
            .create_individuals(vec![candidate("one score=1"), candidate("two score=2")])
            .await
            .unwrap();
        let llm = scripted(|last| {
            if last.contains("Here is some code to write a prompt for") {
                assert!(last.contains("return xs"));
                "<prompt>echo the input score=5</prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = TelephoneMutation::new(
            Arc::new(TelephoneAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            Selection::Elitism { elite_count: 1, k: 1 },
        );

        run_layer(&layer, &mut habitat).await.unwrap();
        assert_eq!(habitat.ids(), ids);
        let mutated = habitat.get(ids[1]).unwrap();
        assert_eq!(mutated.artifacts().specification, "echo the input score=5");
        assert_eq!(mutated.fitness(), 5.0);
        assert!(mutated.artifacts().implementation.contains("sorted(xs)"));
        assert_eq!(habitat.get(ids[0]).unwrap().artifacts().specification, "one score=1");
    }

    #[tokio::test]
    async fn test_cap_zero_kills_everyone() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        habitat
            .create_individuals(vec![candidate("a score=2"), candidate("b score=4")])
            .await
            .unwrap();

        run_layer(&CapPopulation::new(0), &mut habitat).await.unwrap();
        assert!(habitat.is_empty());
        assert_eq!(std::fs::read_dir(habitat.layout().graveyard_dir()).unwrap().count(), 2);
        assert_eq!(std::fs::read_dir(habitat.layout().individuals_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_uncompiled_layer_with_bad_mask_fails_fast() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        habitat
            .create_individuals(vec![candidate("one two three score=1")])
            .await
            .unwrap();
        let llm = scripted(|_| genotype_reply());
        let settings = AgentSettings::default();
        let layer = MaskedMutation::new(
            Arc::new(MutationAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm.clone(), &settings)),
            Selection::All,
        )
        .with_mask(MaskConfig::new(1.0, 0..3));

        let err = run_layer(&layer, &mut habitat).await.unwrap_err();
        assert!(matches!(err, EvolveError::InvalidLayer { .. }));
        assert_eq!(llm.calls(), 0);
        assert_eq!(habitat.len(), 1);
        assert_eq!(habitat.individuals()[0].fitness(), 1.0);
    }

    #[tokio::test]
    async fn test_populate_reaches_target() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let llm = scripted(|last| {
            if last.contains("Please come up with a unique prompt") {
                "<prompt>sort quickly score=2</prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = Populate::new(
            Arc::new(PhenotypeAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            3,
        );

        run_layer(&layer, &mut habitat).await.unwrap();
        assert_eq!(habitat.len(), 3);
        let first = &habitat.individuals()[0];
        assert_eq!(first.artifacts().manifest, "pytest\n");
        assert_eq!(first.fitness(), 2.0);
    }

    #[tokio::test]
    async fn test_populate_stops_at_attempt_budget() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        // 每个候选都在 harness 中崩溃
        let llm = scripted(|last| {
            if last.contains("Please come up with a unique prompt") {
                "<prompt>crash always</prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = Populate::new(
            Arc::new(PhenotypeAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm.clone(), &settings)),
            2,
        )
        .with_max_attempts(5);

        run_layer(&layer, &mut habitat).await.unwrap();
        assert!(habitat.is_empty());
        // 5 次尝试，每次 phenotype + genotype 两个请求
        assert_eq!(llm.calls(), 10);
        assert_eq!(std::fs::read_dir(habitat.layout().graveyard_dir()).unwrap().count(), 5);
    }

    #[tokio::test]
    async fn test_populate_skips_failed_generation() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let llm = scripted(|last| {
            if last.contains("Please come up with a unique prompt") {
                "no tags at all".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = Populate::new(
            Arc::new(PhenotypeAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            1,
        );
        run_layer(&layer, &mut habitat).await.unwrap();
        assert!(habitat.is_empty());
    }

    #[tokio::test]
    async fn test_crossover_creates_children_and_keeps_parents() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let parents = habitat
            .create_individuals(vec![candidate("alpha score=1"), candidate("beta score=2")])
            .await
            .unwrap();
        let llm = scripted(|last| {
            if last.contains("Parent prompt 1") {
                "<child_prompt>merged child score=6</child_prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = MaskedCrossover::new(
            Arc::new(CrossoverAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            Selection::Random { k: 2 },
            2,
            2,
        );
        layer.validate().unwrap();

        run_layer(&layer, &mut habitat).await.unwrap();
        assert_eq!(habitat.len(), 6);
        assert_eq!(&habitat.ids()[..2], parents.as_slice());
        for child in &habitat.individuals()[2..] {
            assert_eq!(child.fitness(), 6.0);
            let mut lineage = child.parent_ids().to_vec();
            lineage.sort();
            let mut expected = parents.clone();
            expected.sort();
            assert_eq!(lineage, expected);
        }
    }

    #[tokio::test]
    async fn test_crossover_rejects_residual_mask() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        habitat
            .create_individuals(vec![candidate("alpha score=1"), candidate("beta score=2")])
            .await
            .unwrap();
        let llm = scripted(|last| {
            if last.contains("Parent prompt 1") {
                "<child_prompt>still [MASK] here</child_prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = MaskedCrossover::new(
            Arc::new(CrossoverAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            Selection::Random { k: 2 },
            1,
            3,
        );
        run_layer(&layer, &mut habitat).await.unwrap();
        assert_eq!(habitat.len(), 2);
    }

    #[tokio::test]
    async fn test_crossover_single_parent_and_empty() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let llm = scripted(|last| {
            if last.contains("Parent prompt 1") {
                "<child_prompt>solo child score=3</child_prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = MaskedCrossover::new(
            Arc::new(CrossoverAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm.clone(), &settings)),
            Selection::Random { k: 2 },
            1,
            1,
        );

        run_layer(&layer, &mut habitat).await.unwrap();
        assert!(habitat.is_empty());
        assert_eq!(llm.calls(), 0);

        let parent = habitat.create_individuals(vec![candidate("only score=1")]).await.unwrap();
        run_layer(&layer, &mut habitat).await.unwrap();
        assert_eq!(habitat.len(), 2);
        assert_eq!(habitat.individuals()[1].parent_ids(), parent.as_slice());
    }

    #[tokio::test]
    async fn test_mutation_resets_in_place() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        let ids = habitat
            .create_individuals(vec![candidate("one score=1"), candidate("two score=2")])
            .await
            .unwrap();
        let llm = scripted(|last| {
            if last.contains("masked sections") {
                "<unmasked_prompt>mutated score=7</unmasked_prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = MaskedMutation::new(
            Arc::new(MutationAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            Selection::All,
        )
        .with_mask(MaskConfig::new(1.0, 1..3));

        run_layer(&layer, &mut habitat).await.unwrap();
        assert_eq!(habitat.ids(), ids);
        for individual in habitat.individuals() {
            assert_eq!(individual.fitness(), 7.0);
            assert_eq!(individual.artifacts().specification, "mutated score=7");
            assert_eq!(individual.state(), LifeState::Alive);
        }
    }

    #[tokio::test]
    async fn test_mutation_failure_reaps_individual() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        habitat
            .create_individuals(vec![candidate("one score=1")])
            .await
            .unwrap();
        let llm = scripted(|last| {
            if last.contains("masked sections") {
                "<unmasked_prompt>crash now</unmasked_prompt>".into()
            } else {
                genotype_reply()
            }
        });
        let settings = AgentSettings::default();
        let layer = MaskedMutation::new(
            Arc::new(MutationAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            Selection::Random { k: 1 },
        );

        run_layer(&layer, &mut habitat).await.unwrap();
        assert!(habitat.is_empty());
        assert_eq!(std::fs::read_dir(habitat.layout().graveyard_dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_mutation_select_deduplicates() {
        let dir = TempDir::new().unwrap();
        let mut habitat = habitat(&dir).await;
        habitat
            .create_individuals(vec![candidate("score=0.01"), candidate("score=0.01"), candidate("score=50")])
            .await
            .unwrap();
        let llm = Arc::new(MockLlmClient::new());
        let settings = AgentSettings::default();
        let layer = MaskedMutation::new(
            Arc::new(MutationAgent::new(llm.clone(), &settings)),
            Arc::new(GenotypeAgent::new(llm, &settings)),
            Selection::RouletteWheel { k: 3 },
        );

        let (population, rng) = habitat.split();
        for _ in 0..20 {
            let mut picked = layer.select(population, rng);
            assert!(!picked.is_empty());
            let len = picked.len();
            picked.sort_unstable();
            picked.dedup();
            assert_eq!(picked.len(), len);
        }
    }
}
