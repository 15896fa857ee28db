//! 核心层：错误分类、优雅关闭与任务取消

pub mod error;
pub mod shutdown;

pub use error::CampaignError;
pub use shutdown::{ShutdownManager, ShutdownReason};
