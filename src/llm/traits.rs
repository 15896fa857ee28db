//! LLM 客户端抽象
//!
//! 所有后端（Cerebras / Fireworks / Groq / Together / Perplexity / Mock）实现 LlmClient：complete（非流式）。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// 客户端层错误（网络、超时、缺少 Key、空回复）
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("missing API key: {0}")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("empty response from {0}")]
    EmptyResponse(String),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回首条 choice 的文本
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
