//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 默认返回一段包含所有协作者标签的固定回复，使整条流水线可以本地跑通；
//! 测试中可用 `with_responder` 注入按请求内容决定回复的闭包。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// 根据完整请求（system + 历史 + user）生成回复
pub type Responder = dyn Fn(&[Message]) -> String + Send + Sync;

const CANNED_RESPONSE: &str = r#"<schematic>
A single module exposing `solve(*args)`.
</schematic>
<fitness>
def fitness(genotype):
    return 1.0 if hasattr(genotype, "solve") else 0.0
</fitness>
<prompt>Write a function `solve` that solves the problem directly.</prompt>
<genotype_py>
def solve(*args):
    return None
</genotype_py>
<requirements_txt></requirements_txt>
<child_prompt>Write a function `solve` combining both approaches.</child_prompt>
<unmasked_prompt>Write a function `solve` that solves the problem robustly.</unmasked_prompt>
<selection>example_0</selection>"#;

/// Mock 客户端：固定回复或脚本化回复
#[derive(Default)]
pub struct MockLlmClient {
    responder: Option<Arc<Responder>>,
    calls: AtomicU64,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[Message]) -> String + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            calls: AtomicU64::new(0),
        }
    }

    /// 已收到的请求数
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MockLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlmClient")
            .field("scripted", &self.responder.is_some())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(match &self.responder {
            Some(responder) => responder(messages),
            None => CANNED_RESPONSE.to_string(),
        })
    }
}
