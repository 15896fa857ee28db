//! LLM 工厂：按任务配置创建推理 / 调研客户端
//!
//! 服务端只依赖 `LlmFactory`，生产环境用 `ProviderFactory`（读取环境变量中的 API Key），
//! 配置 `llm.mock = true` 或测试时用 `MockFactory`。

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{
    create_perplexity_client, create_provider_client, LlmClient, LlmError, Provider,
    ScriptedLlmClient,
};

pub trait LlmFactory: Send + Sync {
    /// 推理模型（各阶段与文案生成）
    fn reasoning(&self, provider: Provider, model: Option<&str>)
        -> Result<Arc<dyn LlmClient>, LlmError>;

    /// 联网调研模型（search 开启时的市场分析）
    fn research(&self) -> Result<Arc<dyn LlmClient>, LlmError>;
}

/// 真实 provider：模型优先级 请求指定 > 配置 llm.models.<provider> > 内置默认
pub struct ProviderFactory {
    models: HashMap<String, String>,
}

impl ProviderFactory {
    pub fn new(cfg: &LlmSection) -> Self {
        Self {
            models: cfg.models.clone(),
        }
    }
}

impl LlmFactory for ProviderFactory {
    fn reasoning(
        &self,
        provider: Provider,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmClient>, LlmError> {
        let model = model.or_else(|| self.models.get(provider.as_str()).map(String::as_str));
        Ok(Arc::new(create_provider_client(provider, model)?))
    }

    fn research(&self) -> Result<Arc<dyn LlmClient>, LlmError> {
        let model = self.models.get("perplexity").map(String::as_str);
        Ok(Arc::new(create_perplexity_client(model)?))
    }
}

/// 所有 provider 共用同一个脚本化客户端
pub struct MockFactory {
    client: Arc<ScriptedLlmClient>,
}

impl MockFactory {
    pub fn new(client: Arc<ScriptedLlmClient>) -> Self {
        Self { client }
    }

    pub fn campaign() -> Self {
        Self::new(Arc::new(ScriptedLlmClient::campaign()))
    }

    pub fn client(&self) -> &Arc<ScriptedLlmClient> {
        &self.client
    }
}

impl LlmFactory for MockFactory {
    fn reasoning(&self, _: Provider, _: Option<&str>) -> Result<Arc<dyn LlmClient>, LlmError> {
        Ok(self.client.clone())
    }

    fn research(&self) -> Result<Arc<dyn LlmClient>, LlmError> {
        Ok(self.client.clone())
    }
}

/// 根据配置选择工厂
pub fn create_factory(cfg: &LlmSection) -> Arc<dyn LlmFactory> {
    if cfg.mock {
        tracing::warn!("llm.mock enabled: all providers replaced by the scripted mock");
        Arc::new(MockFactory::campaign())
    } else {
        Arc::new(ProviderFactory::new(cfg))
    }
}
