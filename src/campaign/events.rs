//! 状态事件：流水线推给订阅方的消息
//!
//! 线上格式统一为 `{"type": ..., "data": ...}`；`completed` 的 data 为 null。

use serde::Serialize;
use serde_json::{json, Value};

use crate::copy::Artifact;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// 阶段进度 / 阶段完成；status 为阶段 slug（开始时为 "started"）
    StatusUpdate { status: String, message: String },
    /// 一条成品文案
    ResourceCreated(Artifact),
    /// 不可恢复的错误（终止）
    Error { message: String },
    /// 全部完成（终止）
    Completed,
}

#[derive(Serialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    data: Value,
}

impl StatusEvent {
    pub fn status(status: impl Into<String>, message: impl Into<String>) -> Self {
        StatusEvent::StatusUpdate {
            status: status.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StatusEvent::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StatusEvent::StatusUpdate { .. } => "status_update",
            StatusEvent::ResourceCreated(_) => "resource_created",
            StatusEvent::Error { .. } => "error",
            StatusEvent::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusEvent::Error { .. } | StatusEvent::Completed)
    }

    pub fn to_json(&self) -> Value {
        let data = match self {
            StatusEvent::StatusUpdate { status, message } => {
                json!({ "status": status, "message": message })
            }
            StatusEvent::ResourceCreated(artifact) => {
                serde_json::to_value(artifact).unwrap_or(Value::Null)
            }
            StatusEvent::Error { message } => json!({ "message": message }),
            StatusEvent::Completed => Value::Null,
        };
        serde_json::to_value(WireMessage {
            kind: self.kind(),
            data,
        })
        .unwrap_or(Value::Null)
    }

    /// 序列化为一帧文本
    pub fn to_frame(&self) -> String {
        self.to_json().to_string()
    }
}

/// 事件出口：流水线只依赖这个接口，不关心订阅方是否还在
pub trait EventSink: Send + Sync {
    /// 返回 false 表示事件未送达（无订阅方或已关闭），调用方无需处理
    fn emit(&self, event: StatusEvent) -> bool;
}

/// 收集事件（测试与离线运行）
#[derive(Default)]
pub struct CollectingSink {
    events: std::sync::Mutex<Vec<StatusEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: StatusEvent) -> bool {
        match self.events.lock() {
            Ok(mut events) => {
                events.push(event);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::artifact::Tweet;

    #[test]
    fn test_wire_frames() {
        let v = StatusEvent::status("audience", "Found 2 audiences").to_json();
        assert_eq!(v["type"], "status_update");
        assert_eq!(v["data"]["status"], "audience");
        assert_eq!(v["data"]["message"], "Found 2 audiences");

        let v = StatusEvent::Completed.to_json();
        assert_eq!(v["type"], "completed");
        assert!(v.get("data").is_some_and(Value::is_null));

        let v = StatusEvent::error("boom").to_json();
        assert_eq!(v["data"]["message"], "boom");
    }

    #[test]
    fn test_resource_frame_carries_artifact() {
        let artifact = Artifact {
            title: "hook".into(),
            content: "body".into(),
            metadata: Tweet {
                hook: "hook".into(),
                tweet: "body".into(),
                image_description: None,
                hashtags: vec![],
                mentions: vec![],
            }
            .into(),
        };
        let v = StatusEvent::ResourceCreated(artifact).to_json();
        assert_eq!(v["type"], "resource_created");
        assert_eq!(v["data"]["resource_type"], "Tweet");
        assert_eq!(v["data"]["metadata"]["hook"], "hook");
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(StatusEvent::Completed.is_terminal());
        assert!(StatusEvent::error("x").is_terminal());
        assert!(!StatusEvent::status("started", "Campaign started").is_terminal());
    }
}
