//! LLM 层：客户端抽象、OpenAI 兼容实现、provider 表、结构化输出、Mock 与工厂

pub mod factory;
pub mod mock;
pub mod openai;
pub mod providers;
pub mod structured;
pub mod traits;

pub use factory::{create_factory, LlmFactory, MockFactory, ProviderFactory};
pub use mock::ScriptedLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use providers::{
    create_perplexity_client, create_provider_client, Provider, PERPLEXITY_BASE_URL,
    PERPLEXITY_ONLINE_MODEL,
};
pub use structured::{PromptArgs, StructuredLlm};
pub use traits::{LlmClient, LlmError};
