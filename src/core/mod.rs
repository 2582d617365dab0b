//! 核心层：错误类型、有界工作池、Environment 构建器

pub mod builder;
pub mod error;
pub mod worker_pool;

pub use builder::EnvironmentBuilder;
pub use error::{CollaboratorError, EvaluationError, EvolveError, IndividualFailure, SandboxError};
pub use worker_pool::WorkerPool;
