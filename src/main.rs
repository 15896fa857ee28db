//! Marketing Agent 服务端
//!
//! 入口：加载配置、初始化日志、创建 LLM 工厂与搜索客户端，启动 HTTP / WebSocket 服务直到收到关闭信号。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use marketing_agent::config::load_config;
use marketing_agent::core::ShutdownManager;
use marketing_agent::llm::create_factory;
use marketing_agent::observability;
use marketing_agent::search::{SearchProvider, StaticSearch, TavilySearch};
use marketing_agent::server::{serve, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 可选：第一个参数为额外配置文件
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let factory = create_factory(&config.llm);
    let search: Arc<dyn SearchProvider> = match TavilySearch::from_env(&config.search) {
        Ok(tavily) => Arc::new(tavily),
        Err(e) => {
            tracing::warn!(error = %e, "web search disabled, using static results");
            Arc::new(StaticSearch::default())
        }
    };

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let bind = config.server.bind.clone();
    let state = Arc::new(AppState::new(config, factory, search, Arc::clone(&shutdown)));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!(addr = %bind, "marketing agent listening");

    serve(listener, state).await.context("Server error")?;
    Ok(())
}
