//! 任务表：job_id -> 状态通道 + 取消令牌
//!
//! 通道关闭且流水线结束后条目即被移除；兜底由定时清理按 TTL 回收已结束的任务。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::campaign::new_job_id;
use crate::server::channel::{ChannelState, StatusChannel};

/// 一个运行中（或刚结束）的任务
pub struct JobHandle {
    pub id: String,
    pub channel: Arc<StatusChannel>,
    pub cancel: CancellationToken,
    finished: AtomicBool,
    created_at: Instant,
}

impl JobHandle {
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.is_finished() && self.created_at.elapsed() > ttl
    }
}

pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// 分配一个在存活任务中唯一的 id 并登记通道
    pub async fn create(&self, cancel: CancellationToken) -> Arc<JobHandle> {
        let mut jobs = self.jobs.write().await;
        let id = loop {
            let candidate = new_job_id();
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
        };
        let handle = Arc::new(JobHandle {
            id: id.clone(),
            channel: Arc::new(StatusChannel::new(id.clone())),
            cancel,
            finished: AtomicBool::new(false),
            created_at: Instant::now(),
        });
        jobs.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, job_id: &str) -> Option<Arc<JobHandle>> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// 取消任务；未知 id 返回 false
    pub async fn cancel(&self, job_id: &str) -> bool {
        match self.get(job_id).await {
            Some(handle) => {
                tracing::info!(job_id, "job cancellation requested");
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// 流水线结束
    pub async fn mark_finished(&self, job_id: &str) {
        if let Some(handle) = self.get(job_id).await {
            handle.finished.store(true, Ordering::SeqCst);
        }
        self.release_if_done(job_id).await;
    }

    /// 通道关闭或任务结束后调用：两者都满足时移除
    pub async fn release_if_done(&self, job_id: &str) {
        let mut jobs = self.jobs.write().await;
        let done = jobs
            .get(job_id)
            .is_some_and(|h| h.is_finished() && h.channel.state() == ChannelState::Closed);
        if done {
            jobs.remove(job_id);
            tracing::debug!(job_id, "job released");
        }
    }

    /// 回收超过 TTL 的已结束任务（订阅方一直没来的情况）
    pub async fn cleanup_expired(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, h| !h.is_expired(self.ttl));
        before - jobs.len()
    }

    /// 后台定时清理，随 shutdown 令牌退出
    pub fn spawn_reaper(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let period = (store.ttl / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = store.cleanup_expired().await;
                        if removed > 0 {
                            tracing::info!(removed, "expired jobs reaped");
                        }
                    }
                }
            }
        })
    }
}
