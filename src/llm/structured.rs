//! 结构化输出层
//!
//! 把「全大写键 -> 值」的提示参数编译成 `<KEY>...</KEY>` 段落，system prompt 附上目标类型的 JSON Schema，
//! 从回复中提取 fenced code block 再反序列化。解析失败时把原回复与错误追加进对话重新提示一次，
//! 第二次仍失败则作为 provider 错误上抛。每次调用都带超时，不重试。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::CampaignError;
use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// 有序提示参数（键约定全大写，如 PRODUCT_DESCRIPTION、TASK）
#[derive(Debug, Clone, Default)]
pub struct PromptArgs {
    args: Vec<(String, Value)>,
}

impl PromptArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.args.push((key.to_string(), value));
        self
    }

    pub fn task(self, task: impl Into<String>) -> Self {
        self.arg("TASK", task.into())
    }

    /// 每个参数序列化为缩进 JSON、XML 转义后包进同名标签，段落间空一行
    pub fn compile(&self) -> String {
        self.args
            .iter()
            .map(|(key, value)| {
                let rendered = serde_json::to_string_pretty(value).unwrap_or_default();
                format!("<{key}>{}</{key}>", xml_escape(&rendered))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// 对象查询的 system prompt：要求按 schema 返回 JSON 实例
pub fn object_system_prompt<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "Your task is to understand the content and provide the parsed objects in json \
         that matches the following json_schema:\n\n{schema}\n\n\
         Make sure to return an instance of the JSON, not the schema itself."
    )
}

/// 块查询的 system prompt：只返回一个 fenced code block
pub fn block_system_prompt(block_type: &str) -> String {
    format!(
        "Respond with a single fenced code block and nothing else. Provide the response \
         within: ```{block_type}\ncontent\n```.\n\nThe content should be {block_type}-formatted."
    )
}

const OBJECT_SUFFIX: &str = "\n\nReturn the correct JSON response within a ```json codeblock, \
     not the JSON_SCHEMA. Use only fields specified by the JSON_SCHEMA and nothing else.";

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```([A-Za-z0-9_-]*)[^\S\n]*\n?(.*?)```").expect("valid fence regex")
    })
}

/// 从回复中取出 JSON 对象并反序列化：优先 ```json 块，其次任意 ``` 块，最后回退到首个 `{` 至末个 `}`
pub fn parse_object<T: DeserializeOwned>(content: &str) -> Result<T, CampaignError> {
    let fences: Vec<(String, String)> = fence_regex()
        .captures_iter(content)
        .map(|c| (c[1].to_lowercase(), c[2].trim().to_string()))
        .collect();

    let candidate = fences
        .iter()
        .find(|(lang, _)| lang == "json")
        .or_else(|| fences.first())
        .map(|(_, body)| body.clone())
        .or_else(|| {
            let start = content.find('{')?;
            let end = content.rfind('}')?;
            (end > start).then(|| content[start..=end].to_string())
        })
        .ok_or_else(|| CampaignError::StructuredOutput("no JSON code block in response".into()))?;

    serde_json::from_str(&candidate).map_err(|e| CampaignError::StructuredOutput(e.to_string()))
}

/// 从回复中取出指定类型的最后一个代码块；没有代码块时接受整段非空文本
pub fn parse_block(block_type: &str, content: &str) -> Result<String, CampaignError> {
    let body = fence_regex()
        .captures_iter(content)
        .filter(|c| c[1].eq_ignore_ascii_case(block_type))
        .last()
        .map(|c| c[2].trim().to_string())
        .unwrap_or_else(|| content.trim().to_string());

    if body.is_empty() {
        return Err(CampaignError::StructuredOutput(format!(
            "empty {block_type} block in response"
        )));
    }
    Ok(body)
}

fn reprompt(error: &CampaignError) -> Message {
    Message::user(format!(
        "The previous response could not be parsed ({error}). Respond again following the \
         required format exactly."
    ))
}

/// 带超时与单次重新提示的结构化查询包装
#[derive(Clone)]
pub struct StructuredLlm {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl StructuredLlm {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 单次 provider 调用（超时即失败）
    pub async fn complete(&self, messages: &[Message]) -> Result<String, CampaignError> {
        match tokio::time::timeout(self.timeout, self.llm.complete(messages)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs()).into()),
        }
    }

    /// 查询并解析为对象 T
    pub async fn query_object<T>(&self, args: PromptArgs) -> Result<T, CampaignError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let mut messages = vec![
            Message::system(object_system_prompt::<T>()),
            Message::user(args.compile() + OBJECT_SUFFIX),
        ];
        self.query_with_reprompt(&mut messages, |raw| parse_object::<T>(raw))
            .await
    }

    /// 查询一个 `block_type` 代码块（如 md）
    pub async fn query_block(
        &self,
        block_type: &str,
        args: PromptArgs,
    ) -> Result<String, CampaignError> {
        let mut messages = vec![
            Message::system(block_system_prompt(block_type)),
            Message::user(args.compile()),
        ];
        self.query_with_reprompt(&mut messages, |raw| parse_block(block_type, raw))
            .await
    }

    async fn query_with_reprompt<R>(
        &self,
        messages: &mut Vec<Message>,
        parse: impl Fn(&str) -> Result<R, CampaignError>,
    ) -> Result<R, CampaignError> {
        let raw = self.complete(messages).await?;
        match parse(&raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(
                    provider = %self.llm.name(),
                    error = %err,
                    "structured output rejected, re-prompting once"
                );
                messages.push(Message::assistant(raw));
                messages.push(reprompt(&err));
                let raw = self.complete(messages).await?;
                parse(&raw).map_err(CampaignError::escalate)
            }
        }
    }
}
