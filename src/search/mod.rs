//! Web 搜索：查询进，排序后的摘要出
//!
//! 只依赖请求/响应契约；默认实现调用 Tavily（POST https://api.tavily.com/search，Key 取自 TAVILY_API_KEY），
//! 客户端带超时与 User-Agent。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SearchSection;
use crate::llm::LlmError;

pub const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// 单条搜索结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSnippet {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, LlmError>;
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchSnippet>,
}

/// Tavily 搜索客户端
pub struct TavilySearch {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, cfg: &SearchSection) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("marketing-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            endpoint: TAVILY_SEARCH_URL.to_string(),
            max_results: cfg.max_results.max(1),
        }
    }

    /// 从环境变量 TAVILY_API_KEY 创建
    pub fn from_env(cfg: &SearchSection) -> Result<Self, LlmError> {
        let key = std::env::var("TAVILY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey("TAVILY_API_KEY".into()))?;
        Ok(Self::new(key, cfg))
    }

    /// 覆盖接口地址（自建代理或测试服务器）
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, LlmError> {
        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("search request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(LlmError::Request(format!("search HTTP {}", resp.status())));
        }
        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Request(format!("search response: {e}")))?;

        tracing::debug!(query, results = parsed.results.len(), "search done");
        Ok(parsed.results.into_iter().take(self.max_results).collect())
    }
}

/// 固定结果的搜索（测试与 mock 模式）
#[derive(Debug, Default, Clone)]
pub struct StaticSearch {
    pub snippets: Vec<SearchSnippet>,
}

impl StaticSearch {
    pub fn new(snippets: Vec<SearchSnippet>) -> Self {
        Self { snippets }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchSnippet>, LlmError> {
        if self.snippets.is_empty() {
            return Ok(vec![SearchSnippet {
                title: query.to_string(),
                url: String::new(),
                content: format!("No indexed results for: {query}"),
            }]);
        }
        Ok(self.snippets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tavily_response_parsing() {
        let raw = r#"{"query":"q","results":[{"title":"T","url":"https://x","content":"C","score":0.9}]}"#;
        let parsed: TavilyResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].content, "C");

        let empty: TavilyResponse = serde_json::from_str(r#"{"query":"q"}"#).unwrap();
        assert!(empty.results.is_empty());
    }

    #[tokio::test]
    async fn test_static_search_placeholder() {
        let search = StaticSearch::default();
        let results = search.search("rust").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("rust"));
    }

    #[tokio::test]
    async fn test_tavily_unreachable_endpoint_errors() {
        let search = TavilySearch::new("key", &SearchSection::default())
            .with_endpoint("http://127.0.0.1:9/search");
        let err = search.search("anything").await.unwrap_err();
        assert!(matches!(err, LlmError::Request(_)));
    }
}
