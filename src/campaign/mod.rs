//! 营销任务：阶段数据结构、Job、状态事件、五阶段流水线

pub mod events;
pub mod job;
pub mod pipeline;
pub mod types;

pub use events::{CollectingSink, EventSink, StatusEvent};
pub use job::{new_job_id, Job, JobConfig};
pub use pipeline::CampaignPipeline;
pub use types::Phase;
