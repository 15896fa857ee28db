//! 推理 provider 表（均为 OpenAI 兼容格式）
//!
//! - Cerebras: https://api.cerebras.ai/v1
//! - Fireworks: https://api.fireworks.ai/inference/v1
//! - Groq: https://api.groq.com/openai/v1
//! - Together: https://api.together.xyz/v1
//! - Perplexity（联网模型，仅用于市场调研）: https://api.perplexity.ai
//!
//! API Key 从 `<PROVIDER>_API_KEY` 环境变量读取。

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::llm::{LlmError, OpenAiClient};

pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
pub const PERPLEXITY_ONLINE_MODEL: &str = "llama-3.1-sonar-large-128k-online";

/// 可在 intake 请求中选择的推理 provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Cerebras,
    Fireworks,
    Groq,
    Together,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Cerebras,
        Provider::Fireworks,
        Provider::Groq,
        Provider::Together,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Cerebras => "cerebras",
            Provider::Fireworks => "fireworks",
            Provider::Groq => "groq",
            Provider::Together => "together",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Cerebras => "https://api.cerebras.ai/v1",
            Provider::Fireworks => "https://api.fireworks.ai/inference/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Together => "https://api.together.xyz/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Cerebras => "llama3.1-70b",
            Provider::Fireworks => "accounts/fireworks/models/llama-v3p1-70b-instruct",
            Provider::Groq => "llama-3.1-70b-versatile",
            Provider::Together => "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Cerebras => "CEREBRAS_API_KEY",
            Provider::Fireworks => "FIREWORKS_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
            Provider::Together => "TOGETHER_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = Provider::ALL.iter().map(|p| p.as_str()).collect();
                format!("Unsupported provider: {s} (expected one of {})", names.join(", "))
            })
    }
}

fn api_key(var: &str) -> Result<String, LlmError> {
    std::env::var(var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| LlmError::MissingApiKey(var.to_string()))
}

/// 创建推理 provider 客户端；model 为空时用 provider 默认模型
pub fn create_provider_client(
    provider: Provider,
    model: Option<&str>,
) -> Result<OpenAiClient, LlmError> {
    let key = api_key(provider.api_key_env())?;
    let model = model.unwrap_or_else(|| provider.default_model());
    Ok(OpenAiClient::new(
        provider.as_str(),
        provider.base_url(),
        model,
        &key,
    ))
}

/// 创建 Perplexity 联网模型客户端（开启 search 时用于市场调研）
pub fn create_perplexity_client(model: Option<&str>) -> Result<OpenAiClient, LlmError> {
    let key = api_key("PERPLEXITY_API_KEY")?;
    Ok(OpenAiClient::new(
        "perplexity",
        PERPLEXITY_BASE_URL,
        model.unwrap_or(PERPLEXITY_ONLINE_MODEL),
        &key,
    ))
}
