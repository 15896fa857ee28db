//! 服务端：任务受理、任务表、状态通道、聊天会话与 axum 路由

pub mod channel;
pub mod http;
pub mod intake;
pub mod jobs;
pub mod session;

pub use channel::{ChannelState, StatusChannel};
pub use http::{router, serve, ApiError, AppState};
pub use intake::{start_job, validate, GenerateRequest, GenerateResponse};
pub use jobs::{JobHandle, JobStore};
pub use session::SessionStore;
