//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 按规则匹配：把整段对话拼起来，第一个 needle 命中的规则给出回复；规则可以是固定回复，也可以是按序弹出的回复序列
//! （最后一条会一直重复）。未命中时回显最后一条 User 消息。`campaign()` 内置一整套营销流水线的结构化回复。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

type Reply = Result<String, LlmError>;

struct Rule {
    needle: String,
    replies: Mutex<VecDeque<Reply>>,
}

/// 脚本化客户端：规则 + 调用记录
#[derive(Default)]
pub struct ScriptedLlmClient {
    rules: Vec<Rule>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定回复
    pub fn rule(self, needle: &str, reply: Reply) -> Self {
        self.rule_sequence(needle, vec![reply])
    }

    /// 依次返回 replies，用完后重复最后一条
    pub fn rule_sequence(mut self, needle: &str, replies: Vec<Reply>) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            replies: Mutex::new(replies.into()),
        });
        self
    }

    /// 追加另一个客户端的规则（排在已有规则之后）
    pub fn merge(mut self, other: ScriptedLlmClient) -> Self {
        self.rules.extend(other.rules);
        self
    }

    /// 每次调用前等待（配合 tokio 暂停时钟测试超时）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 每次调用收到的完整消息列表
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_reply(rule: &Rule) -> Reply {
        let Ok(mut replies) = rule.replies.lock() else {
            return Err(LlmError::Request("mock rule poisoned".into()));
        };
        if replies.len() > 1 {
            replies.pop_front().unwrap_or_else(|| Ok(String::new()))
        } else {
            replies.front().cloned().unwrap_or_else(|| Ok(String::new()))
        }
    }

    /// 内置营销流水线脚本：每个阶段返回合法的结构化回复，渠道覆盖 LinkedIn / Email / Tweet
    pub fn campaign() -> Self {
        Self::new()
            .rule("\"title\": \"AngleCandidates\"", Ok(fenced_json(ANGLES)))
            .rule("\"title\": \"MarketAnalysis\"", Ok(fenced_json(MARKETS)))
            .rule("\"title\": \"AudienceAnalysis\"", Ok(fenced_json(AUDIENCES)))
            .rule("\"title\": \"ChannelSuggestions\"", Ok(fenced_json(CHANNELS)))
            .rule("\"title\": \"CopyStrategy\"", Ok(fenced_json(STRATEGY)))
            .rule("\"title\": \"Evaluation\"", Ok(fenced_json(EVALUATION)))
            .rule("\"title\": \"LinkedInPost\"", Ok(fenced_json(LINKEDIN_POST)))
            .rule("\"title\": \"Email\"", Ok(fenced_json(EMAIL)))
            .rule("\"title\": \"Tweet\"", Ok(fenced_json(TWEET)))
            .rule(
                "```md",
                Ok("```md\nShip features, not waiting rooms. Our API streams tokens faster than you can read them.\n```".into()),
            )
            .rule(
                "expert at optimizing search queries",
                Ok("fast llm inference api benchmarks".into()),
            )
            .rule("You are an expert editor", Ok("Evaluation: Sufficient".into()))
            .rule(
                "You are an expert blog post writer",
                Ok("# Fast inference\n\nA short post about fast inference.".into()),
            )
    }
}

fn fenced_json(body: &str) -> String {
    format!("```json\n{}\n```", body.trim())
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let transcript = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(rule) = self.rules.iter().find(|r| transcript.contains(&r.needle)) {
            return Self::next_reply(rule);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

const ANGLES: &str = r#"
{
  "candidates": [
    {
      "problem_addressed": "LLM responses are too slow for interactive products",
      "value_proposition": "Instant inference at thousands of tokens per second",
      "usage": "REST API compatible with the OpenAI client"
    }
  ]
}
"#;

const MARKETS: &str = r#"
{
  "markets": [
    {
      "market_description": "Developer tooling for AI applications",
      "example_products": ["AI copilots", "chat assistants"],
      "capturable_market_size_dollars": "$2B",
      "market_growth_yoy": "35%"
    }
  ]
}
"#;

const AUDIENCES: &str = r#"
{
  "audiences": [
    {
      "type": "Enterprise",
      "description": "Platform teams shipping LLM features",
      "enterprise_profile": "Mid-size SaaS companies",
      "profile_name": "AI Platform Lead",
      "decision_maker": "VP Engineering",
      "demographics": ["software engineers", "ML engineers"]
    }
  ]
}
"#;

const CHANNELS: &str = r#"
{
  "channels": [
    {
      "name": "LinkedIn",
      "description": "Professional network posts",
      "copy_format": "LINKEDIN_POST",
      "pros": ["reaches decision makers"],
      "cons": ["slower virality"]
    },
    {
      "name": "Newsletter",
      "description": "Direct email to developers",
      "copy_format": "EMAIL",
      "pros": ["high intent"],
      "cons": ["needs a list"]
    },
    {
      "name": "X",
      "description": "Short-form social posts",
      "copy_format": "TWEET",
      "pros": ["developer heavy"],
      "cons": ["noisy"]
    }
  ]
}
"#;

const STRATEGY: &str = r#"
{
  "strategy": "Lead with a latency benchmark",
  "product_positioning": "The fastest inference API",
  "competitive_claim": "10x faster than GPU clouds",
  "review_criteria": ["mentions speed", "has a call to action"]
}
"#;

const EVALUATION: &str = r#"
{
  "pros": ["clear benefit"],
  "cons": ["no numbers"],
  "suggestions": ["add a tokens-per-second figure"]
}
"#;

const LINKEDIN_POST: &str = r##"
{
  "title": "Inference at the speed of thought",
  "hashtags": ["#AI", "#LLM"],
  "mentions": [],
  "image_description": "A stopwatch next to a chat window"
}
"##;

const EMAIL: &str = r#"
{
  "subject": "Your LLM app, 10x faster",
  "attachment_descriptions": ["benchmark chart"]
}
"#;

const TWEET: &str = r##"
{
  "hook": "Waiting on your LLM? Stop.",
  "tweet": "Thousands of tokens per second, one API call away.",
  "image_description": null,
  "hashtags": ["#AI"],
  "mentions": []
}
"##;
