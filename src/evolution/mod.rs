//! 进化引擎：个体生命周期、执行上下文、选择与掩码、流水线层、环境与预设

pub mod environment;
pub mod habitat;
pub mod individual;
pub mod layers;
pub mod mask;
pub mod presets;
pub mod sandbox;
pub mod selection;
pub mod types;

pub use environment::{Environment, FITNESS_MARKER};
pub use habitat::{Candidate, Habitat};
pub use individual::Individual;
pub use layers::{
    run_layer, CapPopulation, Layer, MaskedCrossover, MaskedMutation, Populate, SortByFitness, TelephoneMutation,
};
pub use mask::{MaskConfig, MaskUnit, MASK_TOKEN};
pub use sandbox::{ExecutionContext, VenvContext};
pub use selection::{parent_pairs, DistanceMeasure, Scored, Selection};
pub use types::{
    Artifacts, GenerationReport, IndividualId, Layout, LifeState, Project, ResultRecord, Verdict,
};
