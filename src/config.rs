//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MARKETING__*` 覆盖（双下划线表示嵌套，如 `MARKETING__LLM__DEFAULT_PROVIDER=groq`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub campaign: CampaignSection,
    pub search: SearchSection,
    pub chat: ChatSection,
}

/// [server] 段：监听地址、CORS、任务保留时长
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// 允许跨域的前端地址
    pub allowed_origins: Vec<String>,
    /// 任务结束后（或无人订阅时）在内存中保留的秒数
    pub job_ttl_secs: u64,
    /// 单个任务允许的最大修订次数
    pub max_revisions: u32,
    /// 订阅方断开时是否取消任务（默认否：任务继续跑完并记录日志）
    pub cancel_on_disconnect: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            job_ttl_secs: 600,
            max_revisions: 5,
            cancel_on_disconnect: false,
        }
    }
}

/// [llm] 段：默认 provider、各 provider 模型覆盖、超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// cerebras / fireworks / groq / together
    pub default_provider: String,
    /// 为 true 时所有 provider 都替换为离线脚本化 Mock（本地演示、集成测试）
    pub mock: bool,
    /// provider 名 -> 模型名，未配置时使用内置默认模型
    pub models: HashMap<String, String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            default_provider: "cerebras".to_string(),
            mock: false,
            models: HashMap::new(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次 provider 调用超时（秒）；不重试
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [campaign] 段：各阶段扇出上限（LLM 返回的列表超出时截断）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CampaignSection {
    pub max_angles: usize,
    pub max_markets: usize,
    pub max_audiences: usize,
    pub max_channels: usize,
}

impl Default for CampaignSection {
    fn default() -> Self {
        Self {
            max_angles: 3,
            max_markets: 1,
            max_audiences: 1,
            max_channels: 3,
        }
    }
}

/// [search] 段：Web 搜索超时与返回条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub timeout_secs: u64,
    pub max_results: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_results: 1,
        }
    }
}

/// [chat] 段：单页聊天会话
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    pub provider: String,
    /// 会话历史保留轮数
    pub max_context_turns: usize,
    /// 会话闲置多久后被回收
    pub session_ttl_secs: u64,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            provider: "cerebras".to_string(),
            max_context_turns: 20,
            session_ttl_secs: 3600,
        }
    }
}

/// 从 config 目录加载配置，环境变量 MARKETING__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MARKETING__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MARKETING")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.default_provider, "cerebras");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.server.max_revisions, 5);
        assert!(!cfg.server.cancel_on_disconnect);
        assert_eq!(cfg.campaign.max_angles, 3);
    }

    #[test]
    fn test_load_from_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[llm]
default_provider = "groq"
mock = true

[llm.models]
groq = "llama-3.1-8b-instant"

[campaign]
max_channels = 1
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.default_provider, "groq");
        assert!(cfg.llm.mock);
        assert_eq!(
            cfg.llm.models.get("groq").map(String::as_str),
            Some("llama-3.1-8b-instant")
        );
        assert_eq!(cfg.campaign.max_channels, 1);
        // 未覆盖的键保持默认
        assert_eq!(cfg.campaign.max_angles, 3);
    }
}
