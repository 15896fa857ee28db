//! Marketing Agent - 营销文案生成服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、优雅关闭与取消
//! - **observability**: tracing 初始化
//! - **memory**: 对话消息与短期历史
//! - **llm**: LLM 客户端抽象、OpenAI 兼容实现、provider 表、结构化输出、Mock 与工厂
//! - **search**: Web 搜索（Tavily）
//! - **campaign**: 阶段数据结构、Job、状态事件、五阶段流水线
//! - **copy**: 文案插件与注册表
//! - **server**: 任务受理、状态通道（WebSocket）、聊天会话、HTTP 路由
//! - **workflow**: 调研 / 编辑 / 写作博客工作流

pub mod campaign;
pub mod config;
pub mod copy;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod search;
pub mod server;
pub mod workflow;
