//! 聊天会话
//!
//! 每个会话保存选用的模型与有界对话历史；清空会话即重置上下文。
//! 闲置超过 TTL 的会话由后台定时清理回收。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::CampaignError;
use crate::llm::StructuredLlm;
use crate::memory::{ConversationMemory, Message};

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful marketing assistant. Answer concisely and \
     help the user position products, pick channels and draft copy.";

struct ChatSession {
    model: Option<String>,
    memory: ConversationMemory,
    last_used: Instant,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
    max_turns: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(max_turns: usize, ttl_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// 取得或创建会话；请求指定模型时覆盖会话里记住的模型。返回 (session_id, 生效模型)
    pub async fn open(
        &self,
        session_id: Option<String>,
        model: Option<String>,
    ) -> (String, Option<String>) {
        let id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("session_{}", uuid::Uuid::new_v4()));
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.clone()).or_insert_with(|| ChatSession {
            model: None,
            memory: ConversationMemory::new(self.max_turns),
            last_used: Instant::now(),
        });
        session.last_used = Instant::now();
        if model.is_some() {
            session.model = model;
        }
        (id, session.model.clone())
    }

    /// 一问一答；成功后才写入历史
    pub async fn exchange(
        &self,
        session_id: &str,
        llm: &StructuredLlm,
        message: &str,
    ) -> Result<String, CampaignError> {
        let mut prompt = vec![Message::system(CHAT_SYSTEM_PROMPT)];
        if let Some(session) = self.sessions.read().await.get(session_id) {
            prompt.extend(session.memory.messages().iter().cloned());
        }
        prompt.push(Message::user(message));

        let reply = llm.complete(&prompt).await?;

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.memory.push(Message::user(message));
            session.memory.push(Message::assistant(reply.clone()));
            session.last_used = Instant::now();
        }
        Ok(reply)
    }

    /// 清空会话上下文；未知会话返回 false
    pub async fn clear(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn history_len(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.memory.len())
            .unwrap_or(0)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// 回收闲置超过 TTL 的会话
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_used.elapsed() <= self.ttl);
        before - sessions.len()
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
                            tracing::info!(removed, "idle chat sessions reaped");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[tokio::test]
    async fn test_history_sent_and_cleared() {
        let mock = Arc::new(ScriptedLlmClient::new());
        let llm = StructuredLlm::new(mock.clone(), Duration::from_secs(5));
        let store = SessionStore::new(10, 3600);

        let (id, model) = store.open(None, Some("llama".into())).await;
        assert!(id.starts_with("session_"));
        assert_eq!(model.as_deref(), Some("llama"));

        let reply = store.exchange(&id, &llm, "hi").await.unwrap();
        assert_eq!(reply, "Echo from Mock: hi");
        store.exchange(&id, &llm, "again").await.unwrap();

        // 第二次调用带上了第一轮对话
        let calls = mock.calls();
        assert_eq!(calls[1].len(), 4);
        assert_eq!(store.history_len(&id).await, 4);

        // 模型在会话内保持
        let (same, model) = store.open(Some(id.clone()), None).await;
        assert_eq!(same, id);
        assert_eq!(model.as_deref(), Some("llama"));

        assert!(store.clear(&id).await);
        assert_eq!(store.history_len(&id).await, 0);
        assert!(!store.clear(&id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_reaped() {
        let store = Arc::new(SessionStore::new(10, 60));
        let (idle, _) = store.open(None, None).await;
        tokio::time::advance(Duration::from_secs(45)).await;
        let (active, _) = store.open(None, None).await;
        assert_eq!(store.len().await, 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.history_len(&idle).await, 0);
        assert!(!store.clear(&idle).await);
        assert!(store.clear(&active).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_stops_on_shutdown() {
        let store = Arc::new(SessionStore::new(10, 2));
        store.open(Some("s1".into()), None).await;
        let shutdown = CancellationToken::new();
        let reaper = store.spawn_reaper(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(store.is_empty().await);

        shutdown.cancel();
        reaper.await.unwrap();
    }
}
