//! 任务错误类型
//!
//! Validation 在建任务前拒绝；Provider 为阶段致命错误；StructuredOutput 先重新提示一次，再次失败才升级为 Provider；
//! Channel 表示订阅方已离开，仅丢弃后续推送。

use thiserror::Error;

use crate::llm::LlmError;

/// 营销任务运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed structured output: {0}")]
    StructuredOutput(String),

    #[error("Subscriber gone: {0}")]
    Channel(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl CampaignError {
    /// 结构化输出在重新提示后仍失败时，按 provider 错误处理
    pub fn escalate(self) -> Self {
        match self {
            CampaignError::StructuredOutput(msg) => CampaignError::Provider(msg),
            other => other,
        }
    }
}

impl From<LlmError> for CampaignError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey(var) => {
                CampaignError::Config(format!("environment variable {var} is not set"))
            }
            other => CampaignError::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalate_structured_output() {
        let err = CampaignError::StructuredOutput("missing field `title`".into()).escalate();
        assert!(matches!(err, CampaignError::Provider(ref m) if m.contains("title")));
    }

    #[test]
    fn test_escalate_keeps_other_variants() {
        assert!(matches!(
            CampaignError::Cancelled.escalate(),
            CampaignError::Cancelled
        ));
    }

    #[test]
    fn test_from_llm_error() {
        let err: CampaignError = LlmError::Timeout(60).into();
        assert!(matches!(err, CampaignError::Provider(_)));

        let err: CampaignError = LlmError::MissingApiKey("GROQ_API_KEY".into()).into();
        assert!(matches!(err, CampaignError::Config(ref m) if m.contains("GROQ_API_KEY")));
    }
}
