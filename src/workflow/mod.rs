//! 多步写作工作流

pub mod blog;

pub use blog::{BlogOutcome, BlogState, BlogWorkflow, MAX_ITERATIONS};
