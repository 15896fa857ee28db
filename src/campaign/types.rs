//! 流水线各阶段的数据结构
//!
//! 带 `JsonSchema` 的类型直接作为结构化查询的目标；类型名即 schema 标题，字段名即 LLM 需要填写的键。

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 阶段 1：一个营销角度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductAngle {
    /// The problem the product solves for this angle.
    pub problem_addressed: String,
    pub value_proposition: String,
    /// How the product is used to deliver the value proposition.
    pub usage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AngleCandidates {
    pub candidates: Vec<ProductAngle>,
}

/// 阶段 2：目标市场
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Market {
    pub market_description: String,
    pub example_products: Vec<String>,
    pub capturable_market_size_dollars: String,
    pub market_growth_yoy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MarketAnalysis {
    pub markets: Vec<Market>,
}

/// LLM 返回的受众候选，按 `type` 区分三类
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum AudienceCandidate {
    EndUser {
        description: String,
        user_profile: String,
        profile_name: String,
        demographics: Vec<String>,
    },
    Enterprise {
        description: String,
        enterprise_profile: String,
        profile_name: String,
        decision_maker: String,
        demographics: Vec<String>,
    },
    Government {
        description: String,
        agency_profile: String,
        profile_name: String,
        decision_maker: String,
        demographics: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AudienceAnalysis {
    pub audiences: Vec<AudienceCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudienceKind {
    EndUser,
    Enterprise,
    Government,
}

/// 归一化后的受众
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audience {
    pub kind: AudienceKind,
    pub description: String,
    pub profile: String,
    pub profile_name: String,
    pub decision_maker: Option<String>,
    pub demographics: Vec<String>,
}

impl From<AudienceCandidate> for Audience {
    fn from(c: AudienceCandidate) -> Self {
        match c {
            AudienceCandidate::EndUser {
                description,
                user_profile,
                profile_name,
                demographics,
            } => Audience {
                kind: AudienceKind::EndUser,
                description,
                profile: user_profile,
                profile_name,
                decision_maker: None,
                demographics,
            },
            AudienceCandidate::Enterprise {
                description,
                enterprise_profile,
                profile_name,
                decision_maker,
                demographics,
            } => Audience {
                kind: AudienceKind::Enterprise,
                description,
                profile: enterprise_profile,
                profile_name,
                decision_maker: Some(decision_maker),
                demographics,
            },
            AudienceCandidate::Government {
                description,
                agency_profile,
                profile_name,
                decision_maker,
                demographics,
            } => Audience {
                kind: AudienceKind::Government,
                description,
                profile: agency_profile,
                profile_name,
                decision_maker: Some(decision_maker),
                demographics,
            },
        }
    }
}

/// 阶段 3：投放渠道；copy_format 必须是已注册的文案格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Channel {
    pub name: String,
    pub description: String,
    /// One of the COPY_FORMATS.
    pub copy_format: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChannelSuggestions {
    pub channels: Vec<Channel>,
}

/// 阶段 4：某渠道的内容策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CopyStrategy {
    pub strategy: String,
    pub product_positioning: String,
    pub competitive_claim: String,
    /// Criteria a reviewer should use to judge the copy.
    pub review_criteria: Vec<String>,
}

/// 文案评审结果（修订轮的反馈）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Evaluation {
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub suggestions: Vec<String>,
}

/// 五个阶段，严格按顺序执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ValuePropositions,
    Audience,
    Channels,
    ContentStrategy,
    CopyGeneration,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::ValuePropositions,
        Phase::Audience,
        Phase::Channels,
        Phase::ContentStrategy,
        Phase::CopyGeneration,
    ];

    /// 状态消息中的 status 字段
    pub fn slug(self) -> &'static str {
        match self {
            Phase::ValuePropositions => "value_propositions",
            Phase::Audience => "audience",
            Phase::Channels => "channels",
            Phase::ContentStrategy => "content_strategy",
            Phase::CopyGeneration => "copy_generation",
        }
    }

    /// 1-based 序号
    pub fn number(self) -> usize {
        self as usize + 1
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
