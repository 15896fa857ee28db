//! 状态通道：流水线到单个订阅方的一对一推送
//!
//! Open（任务运行中，订阅方可能尚未连上）-> Draining（终止事件已接受，剩余事件冲刷中）-> Closed。
//! 所有事件都记入历史，订阅方晚到时先按序回放。订阅方断开后 emit 变为 no-op，流水线不受影响。

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::campaign::{EventSink, StatusEvent};
use crate::core::CampaignError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Draining,
    Closed,
}

struct Inner {
    state: ChannelState,
    history: Vec<StatusEvent>,
    subscriber: Option<mpsc::UnboundedSender<StatusEvent>>,
    subscribed: bool,
}

pub struct StatusChannel {
    job_id: String,
    inner: Mutex<Inner>,
}

impl StatusChannel {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            inner: Mutex::new(Inner {
                state: ChannelState::Open,
                history: Vec::new(),
                subscriber: None,
                subscribed: false,
            }),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> ChannelState {
        self.inner
            .lock()
            .map(|i| i.state)
            .unwrap_or(ChannelState::Closed)
    }

    pub fn history(&self) -> Vec<StatusEvent> {
        self.inner
            .lock()
            .map(|i| i.history.clone())
            .unwrap_or_default()
    }

    /// 订阅：每个任务只允许一个订阅方。先回放历史，之后是实时事件；终止事件之后接收端结束。
    pub fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<StatusEvent>, CampaignError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| CampaignError::Channel("status channel poisoned".into()))?;
        if inner.subscribed {
            return Err(CampaignError::Channel(format!(
                "job {} already has a subscriber",
                self.job_id
            )));
        }
        if inner.state == ChannelState::Closed {
            return Err(CampaignError::Channel(format!(
                "status channel for job {} is closed",
                self.job_id
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for event in &inner.history {
            // 接收端刚创建，发送不会失败
            let _ = tx.send(event.clone());
        }
        inner.subscribed = true;
        if inner.state == ChannelState::Open {
            inner.subscriber = Some(tx);
        }
        tracing::debug!(
            job_id = %self.job_id,
            replayed = inner.history.len(),
            "subscriber attached"
        );
        Ok(rx)
    }

    /// 订阅方断开：通道关闭，此后 emit 为 no-op
    pub fn detach(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscriber = None;
            if inner.state != ChannelState::Closed {
                tracing::info!(job_id = %self.job_id, state = ?inner.state, "subscriber detached");
                inner.state = ChannelState::Closed;
            }
        }
    }

    /// 传输层冲刷完终止事件后调用
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscriber = None;
            inner.state = ChannelState::Closed;
        }
    }
}

impl EventSink for StatusChannel {
    fn emit(&self, event: StatusEvent) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.state != ChannelState::Open {
            return false;
        }

        let terminal = event.is_terminal();
        inner.history.push(event.clone());
        let delivered = match inner.subscriber.as_ref().map(|tx| tx.send(event)) {
            Some(Ok(())) => true,
            Some(Err(_)) => {
                tracing::debug!(job_id = %self.job_id, "subscriber gone, dropping further pushes");
                inner.subscriber = None;
                false
            }
            None => false,
        };

        if terminal {
            inner.state = ChannelState::Draining;
            // 释放发送端，接收方读完终止事件后即结束
            inner.subscriber = None;
        }
        delivered
    }
}
