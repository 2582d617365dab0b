//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / 重试包装）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{CompletionOptions, LlmClient, LlmError, RetryConfig, RetryingLlmClient};

use crate::config::LlmSection;

/// 按 [llm] 配置创建客户端：mock 直接返回；其余走 OpenAI 兼容端点并包上重试
pub fn create_llm_from_config(section: &LlmSection) -> Arc<dyn LlmClient> {
    match section.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::info!("using mock llm client");
            Arc::new(MockLlmClient::new())
        }
        provider => {
            tracing::info!(provider, model = %section.model, base_url = ?section.base_url, "using openai-compatible llm client");
            let client: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
                section.base_url.as_deref(),
                &section.model,
                section.api_key.as_deref(),
            ));
            Arc::new(RetryingLlmClient::new(
                client,
                RetryConfig {
                    max_retries: section.max_retries,
                    base_delay: Duration::from_millis(section.retry_base_delay_ms),
                    ..RetryConfig::default()
                },
            ))
        }
    }
}
