//! Evolver - 由 LLM 生成产物驱动的进化引擎
//!
//! 模块划分：
//! - **agents**: 生成式协作者（项目 / 表型 / 基因型 / 交叉 / 变异）与标签解析
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、有界工作池、Environment 构建器
//! - **evolution**: 个体生命周期、执行上下文、选择策略、掩码、流水线层、环境与预设
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / 重试包装）
//! - **memory**: 协作者的有界对话历史
//! - **observability**: tracing 初始化

pub mod agents;
pub mod config;
pub mod core;
pub mod evolution;
pub mod llm;
pub mod memory;
pub mod observability;

pub use core::{EnvironmentBuilder, EvolveError};
pub use evolution::{Environment, Individual, Layer, Selection};
