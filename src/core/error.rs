//! 错误类型
//!
//! 分层：个体级失败（Setup / Evaluation）只会让个体被淘汰，用 `Verdict::Culled` 显式返回；
//! 协作者失败（Generation）只影响当前候选；存储失败（Storage）是致命的，终止整个进化循环。

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// Environment / Layer 层面向调用方暴露的错误
#[derive(Error, Debug)]
pub enum EvolveError {
    /// 文件系统或沙箱迁移失败：种群完整性无法保证，必须终止
    #[error("Storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Generation failure: {0}")]
    Generation(#[from] CollaboratorError),

    #[error("Project not initialized: call init_project first")]
    ProjectNotInitialized,

    #[error("Pipeline not compiled: call compile before evolve")]
    NotCompiled,

    #[error("Invalid layer {layer}: {reason}")]
    InvalidLayer { layer: String, reason: String },

    #[error("Individual {0} is dead")]
    IndividualDead(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Evolution cancelled")]
    Cancelled,
}

impl EvolveError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_layer(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLayer {
            layer: layer.into(),
            reason: reason.into(),
        }
    }
}

/// 执行上下文（venv / 容器 / 远程沙箱）的失败
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} exited with {status}: {stderr}")]
    NonZeroExit {
        step: String,
        status: String,
        stderr: String,
    },

    #[error("{step} timed out after {}s", .timeout.as_secs())]
    Timeout { step: String, timeout: Duration },

    #[error("Sandbox io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing sandbox file: {0}")]
    Missing(PathBuf),
}

/// 适应度评估失败（harness 非零退出、结果记录缺失或格式错误）
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Harness failed: {0}")]
    Harness(#[from] SandboxError),

    #[error("Result record missing at {0}")]
    MissingRecord(PathBuf),

    #[error("Result record malformed: {0}")]
    MalformedRecord(String),
}

/// 个体级失败：个体被杀死，但不会向上传播
#[derive(Error, Debug)]
pub enum IndividualFailure {
    #[error("Setup failure: {0}")]
    Setup(#[source] SandboxError),

    #[error("Evaluation failure: {0}")]
    Evaluation(#[source] EvaluationError),
}

/// 生成式协作者（LLM Agent）的失败
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Missing field <{0}> in collaborator output")]
    MissingField(String),

    #[error("Collaborator output still contains mask marker {0}")]
    MaskMarkerPresent(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}
