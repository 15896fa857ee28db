//! 营销任务
//!
//! Job 由 intake 创建，之后只被运行它的流水线任务修改；状态通道只读。

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::campaign::events::{EventSink, StatusEvent};
use crate::campaign::types::Phase;
use crate::copy::Artifact;
use crate::llm::Provider;

/// 单个任务的配置（来自请求）
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub provider: Provider,
    pub model: Option<String>,
    /// 总稿数：1 表示只出初稿，n 表示初稿后再改写 n-1 次
    pub revisions: u32,
    pub search: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Cerebras,
            model: None,
            revisions: 1,
            search: false,
        }
    }
}

#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub product_description: String,
    pub config: JobConfig,
    pub phase: Option<Phase>,
    pub events: Vec<StatusEvent>,
    pub artifacts: Vec<Artifact>,
    pub terminal: bool,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(product_description: impl Into<String>, config: JobConfig) -> Self {
        Self::with_id(new_job_id(), product_description, config)
    }

    pub fn with_id(
        id: impl Into<String>,
        product_description: impl Into<String>,
        config: JobConfig,
    ) -> Self {
        Self {
            id: id.into(),
            product_description: product_description.into(),
            config,
            phase: None,
            events: Vec::new(),
            artifacts: Vec::new(),
            terminal: false,
            created_at: Utc::now(),
        }
    }

    /// 记录并推送事件；终止事件之后的一切都被丢弃
    pub fn emit<S: EventSink + ?Sized>(&mut self, sink: &S, event: StatusEvent) {
        if self.terminal {
            tracing::debug!(job_id = %self.id, kind = event.kind(), "event after terminal dropped");
            return;
        }
        self.terminal = event.is_terminal();
        self.events.push(event.clone());
        if !sink.emit(event) {
            tracing::trace!(job_id = %self.id, "no subscriber attached");
        }
    }
}

pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::events::CollectingSink;

    #[test]
    fn test_nothing_after_terminal() {
        let sink = CollectingSink::new();
        let mut job = Job::new("desc", JobConfig::default());
        job.emit(&sink, StatusEvent::status("started", "Campaign started"));
        job.emit(&sink, StatusEvent::error("boom"));
        job.emit(&sink, StatusEvent::Completed);
        job.emit(&sink, StatusEvent::status("audience", "late"));

        assert!(job.terminal);
        assert_eq!(job.events.len(), 2);
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], StatusEvent::error("boom"));
    }

    #[test]
    fn test_job_ids_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| new_job_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
