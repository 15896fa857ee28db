//! 文案插件：每种 copy_format 一个生成器
//!
//! `CopyPlugin` 只有两个能力：根据上下文产出初稿、根据评审意见改写。
//! 内置渠道都是「先结构化元数据，再正文」的两步生成，由 `StructuredCopyPlugin<M>` 统一实现。

use std::marker::PhantomData;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::campaign::types::{Audience, Channel, CopyStrategy, Evaluation, ProductAngle};
use crate::copy::artifact::{Artifact, ArtifactMetadata, TweetList};
use crate::core::CampaignError;
use crate::llm::{PromptArgs, StructuredLlm};

/// 生成一条文案所需的全部上下文
#[derive(Debug, Clone)]
pub struct CopyContext {
    pub product_description: String,
    pub angle: ProductAngle,
    pub audience: Audience,
    pub channel: Channel,
    pub strategy: CopyStrategy,
}

impl CopyContext {
    /// 公共提示参数
    pub fn prompt_args(&self) -> PromptArgs {
        PromptArgs::new()
            .arg("PRODUCT_DESCRIPTION", &self.product_description)
            .arg("PROBLEM_STATEMENT", &self.angle.problem_addressed)
            .arg("VALUE_PROPOSITION", &self.angle.value_proposition)
            .arg("AUDIENCE_PROFILE", &self.audience.profile)
            .arg("DEMOGRAPHICS", &self.audience.demographics)
            .arg("CHANNEL", &self.channel.name)
            .arg("STRATEGY", &self.strategy.strategy)
            .arg("PRODUCT_POSITIONING", &self.strategy.product_positioning)
            .arg("COMPETITIVE_CLAIM", &self.strategy.competitive_claim)
    }
}

#[async_trait]
pub trait CopyPlugin: Send + Sync {
    /// 注册键，如 LINKEDIN_POST
    fn format(&self) -> &str;

    /// 人类可读名称，用于提示与状态消息
    fn name(&self) -> &str;

    async fn produce_draft(
        &self,
        llm: &StructuredLlm,
        ctx: &CopyContext,
    ) -> Result<Artifact, CampaignError>;

    /// 根据评审意见改写，返回替换后的文案
    async fn refine(
        &self,
        llm: &StructuredLlm,
        ctx: &CopyContext,
        draft: &Artifact,
        feedback: &Evaluation,
    ) -> Result<Artifact, CampaignError>;
}

/// 正文形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// markdown 代码块
    Markdown,
    /// 结构化推文列表，序列化为 JSON 字符串
    Thread,
}

/// 元数据类型 M + 正文形态 = 一个渠道
pub struct StructuredCopyPlugin<M> {
    format: &'static str,
    name: &'static str,
    content: ContentKind,
    title: fn(&M) -> String,
    _meta: PhantomData<fn() -> M>,
}

impl<M> StructuredCopyPlugin<M> {
    pub fn new(
        format: &'static str,
        name: &'static str,
        content: ContentKind,
        title: fn(&M) -> String,
    ) -> Self {
        Self {
            format,
            name,
            content,
            title,
            _meta: PhantomData,
        }
    }
}

impl<M> StructuredCopyPlugin<M>
where
    M: DeserializeOwned + Serialize + JsonSchema + Into<ArtifactMetadata> + Send + Sync + 'static,
{
    async fn write_content(
        &self,
        llm: &StructuredLlm,
        args: PromptArgs,
    ) -> Result<String, CampaignError> {
        match self.content {
            ContentKind::Markdown => llm.query_block("md", args).await,
            ContentKind::Thread => {
                let thread: TweetList = llm.query_object(args).await?;
                serde_json::to_string(&thread)
                    .map_err(|e| CampaignError::StructuredOutput(e.to_string()))
            }
        }
    }

    fn assemble(&self, metadata: M, content: String) -> Artifact {
        let title = (self.title)(&metadata);
        let title = if title.trim().is_empty() {
            self.name.to_string()
        } else {
            title
        };
        Artifact {
            title,
            content,
            metadata: metadata.into(),
        }
    }
}

#[async_trait]
impl<M> CopyPlugin for StructuredCopyPlugin<M>
where
    M: DeserializeOwned + Serialize + JsonSchema + Into<ArtifactMetadata> + Send + Sync + 'static,
{
    fn format(&self) -> &str {
        self.format
    }

    fn name(&self) -> &str {
        self.name
    }

    async fn produce_draft(
        &self,
        llm: &StructuredLlm,
        ctx: &CopyContext,
    ) -> Result<Artifact, CampaignError> {
        let metadata: M = llm
            .query_object(ctx.prompt_args().task(format!(
                "Generate the metadata of a {} for the product, tailored to the AUDIENCE_PROFILE \
                 and following the STRATEGY.",
                self.name
            )))
            .await?;

        let content = self
            .write_content(
                llm,
                ctx.prompt_args().arg("METADATA", &metadata).task(format!(
                    "Write the {} described by the METADATA. Emphasize the VALUE_PROPOSITION and \
                     the COMPETITIVE_CLAIM.",
                    self.name
                )),
            )
            .await?;

        Ok(self.assemble(metadata, content))
    }

    async fn refine(
        &self,
        llm: &StructuredLlm,
        ctx: &CopyContext,
        draft: &Artifact,
        feedback: &Evaluation,
    ) -> Result<Artifact, CampaignError> {
        let metadata: M = llm
            .query_object(
                ctx.prompt_args()
                    .arg("METADATA", draft.metadata.fields())
                    .arg("EVALUATION", feedback)
                    .task(format!(
                        "The METADATA describes a {}. Improve the METADATA based on the EVALUATION.",
                        self.name
                    )),
            )
            .await?;

        let content = self
            .write_content(
                llm,
                ctx.prompt_args()
                    .arg("METADATA", &metadata)
                    .arg("CONTENT", &draft.content)
                    .arg("EVALUATION", feedback)
                    .task(format!(
                        "Rewrite the CONTENT of the {} so it addresses the EVALUATION and matches \
                         the METADATA.",
                        self.name
                    )),
            )
            .await?;

        Ok(self.assemble(metadata, content))
    }
}

/// 按内容策略的评审标准给文案打分，产出下一轮改写的意见
pub async fn evaluate_draft(
    llm: &StructuredLlm,
    ctx: &CopyContext,
    plugin: &dyn CopyPlugin,
    draft: &Artifact,
) -> Result<Evaluation, CampaignError> {
    llm.query_object(
        ctx.prompt_args()
            .arg("REVIEW_CRITERIA", &ctx.strategy.review_criteria)
            .arg("TITLE", &draft.title)
            .arg("CONTENT", &draft.content)
            .task(format!(
                "Critique this {} against the REVIEW_CRITERIA. List its pros and cons and give \
                 concrete suggestions for improvement.",
                plugin.name()
            )),
    )
    .await
}
