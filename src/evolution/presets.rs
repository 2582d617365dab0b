//! 预置流水线
//!
//! general(scale)：Populate(2s) → MaskedCrossover(随机一对父代, 2s 个家庭, 每家 2s 个子代)
//! → MaskedMutation(随机 3s 个) → SortByFitness → CapPopulation(15s)

use crate::agents::Collaborators;
use crate::config::EvolutionSection;
use crate::evolution::layers::{
    CapPopulation, Layer, MaskedCrossover, MaskedMutation, Populate, SortByFitness,
};
use crate::evolution::mask::MaskConfig;
use crate::evolution::selection::Selection;

/// 用默认掩码参数构建 general 流水线
pub fn general(agents: &Collaborators, scale: usize) -> Vec<Box<dyn Layer>> {
    general_from_config(
        agents,
        &EvolutionSection {
            scale,
            ..EvolutionSection::default()
        },
    )
}

/// 按 [evolution] 配置构建 general 流水线
pub fn general_from_config(agents: &Collaborators, cfg: &EvolutionSection) -> Vec<Box<dyn Layer>> {
    let s = cfg.scale.max(1);
    let size = cfg.mask_size_min..cfg.mask_size_max;

    vec![
        Box::new(
            Populate::new(agents.phenotype.clone(), agents.genotype.clone(), 2 * s)
                .with_max_attempts(2 * s * cfg.populate_attempt_factor.max(1)),
        ) as Box<dyn Layer>,
        Box::new(
            MaskedCrossover::new(
                agents.crossover.clone(),
                agents.genotype.clone(),
                Selection::Random { k: 2 },
                2 * s,
                2 * s,
            )
            .with_mask(MaskConfig::new(cfg.crossover_mask_rate, size.clone())),
        ),
        Box::new(
            MaskedMutation::new(
                agents.mutation.clone(),
                agents.genotype.clone(),
                Selection::Random { k: 3 * s },
            )
            .with_mask(MaskConfig::new(cfg.mutation_mask_rate, size)),
        ),
        Box::new(SortByFitness),
        Box::new(CapPopulation::new(15 * s)),
    ]
}
