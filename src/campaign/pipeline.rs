//! 五阶段营销流水线
//!
//! 阶段严格串行：营销角度 -> 市场与受众 -> 渠道 -> 内容策略 -> 文案。每个阶段消费上一阶段的结果和产品描述，
//! 完成时推送一条以阶段 slug 为 status 的 status_update。任何 provider 错误立即终止任务（只推送一条 error），
//! 不自动重试；取消令牌在每个阶段和每条文案之前检查，进行中的调用也会被打断。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::campaign::events::{EventSink, StatusEvent};
use crate::campaign::job::{Job, JobConfig};
use crate::campaign::types::{
    AngleCandidates, Audience, AudienceAnalysis, Channel, ChannelSuggestions, CopyStrategy,
    Market, MarketAnalysis, Phase, ProductAngle,
};
use crate::config::CampaignSection;
use crate::copy::{evaluate_draft, CopyContext, CopyRegistry};
use crate::core::CampaignError;
use crate::llm::{LlmFactory, PromptArgs, StructuredLlm};

/// 阶段 2 的产出：一个角度下的市场与受众
struct AngleResearch {
    angle: ProductAngle,
    markets: Vec<Market>,
    audiences: Vec<Audience>,
}

/// 阶段 3 的产出：角度 × 市场 × 受众 的候选渠道
struct Targeting {
    angle: ProductAngle,
    audience: Audience,
    channels: Vec<Channel>,
}

pub struct CampaignPipeline {
    reasoning: StructuredLlm,
    research: StructuredLlm,
    registry: Arc<CopyRegistry>,
    limits: CampaignSection,
    cancel: CancellationToken,
}

impl CampaignPipeline {
    pub fn new(
        reasoning: StructuredLlm,
        research: StructuredLlm,
        registry: Arc<CopyRegistry>,
        limits: CampaignSection,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            reasoning,
            research,
            registry,
            limits,
            cancel,
        }
    }

    /// 按任务配置创建客户端；search 开启时市场分析走联网模型
    pub fn from_factory(
        factory: &dyn LlmFactory,
        config: &JobConfig,
        registry: Arc<CopyRegistry>,
        limits: CampaignSection,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, CampaignError> {
        let reasoning = factory.reasoning(config.provider, config.model.as_deref())?;
        let research = if config.search {
            factory.research()?
        } else {
            reasoning.clone()
        };
        Ok(Self::new(
            StructuredLlm::new(reasoning, timeout),
            StructuredLlm::new(research, timeout),
            registry,
            limits,
            cancel,
        ))
    }

    /// 完整跑一个任务：started -> 五个阶段 -> completed / error（恰好一条终止事件）
    pub async fn run<S: EventSink + ?Sized>(&self, job: &mut Job, sink: &S) {
        job.emit(sink, StatusEvent::status("started", "Campaign started"));
        info!(
            job_id = %job.id,
            provider = %job.config.provider,
            revisions = job.config.revisions,
            "campaign started"
        );

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CampaignError::Cancelled),
            r = self.execute(job, sink) => r,
        };

        let (prompt, completion, total) = self.reasoning.client().token_usage();
        match result {
            Ok(()) => {
                info!(
                    job_id = %job.id,
                    artifacts = job.artifacts.len(),
                    prompt_tokens = prompt,
                    completion_tokens = completion,
                    total_tokens = total,
                    "campaign completed"
                );
                job.emit(sink, StatusEvent::Completed);
            }
            Err(CampaignError::Cancelled) => {
                warn!(job_id = %job.id, phase = ?job.phase, "campaign cancelled");
                job.emit(sink, StatusEvent::error(CampaignError::Cancelled.to_string()));
            }
            Err(e) => {
                error!(job_id = %job.id, phase = ?job.phase, error = %e, "campaign failed");
                job.emit(sink, StatusEvent::error(e.to_string()));
            }
        }
    }

    async fn execute<S: EventSink + ?Sized>(
        &self,
        job: &mut Job,
        sink: &S,
    ) -> Result<(), CampaignError> {
        let angles = self.value_propositions(job, sink).await?;
        let research = self.audience(job, sink, angles).await?;
        let targeting = self.channels(job, sink, research).await?;
        let briefs = self.content_strategy(job, sink, targeting).await?;
        self.copy_generation(job, sink, briefs).await
    }

    fn checkpoint(&self) -> Result<(), CampaignError> {
        if self.cancel.is_cancelled() {
            Err(CampaignError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn begin<S: EventSink + ?Sized>(
        &self,
        job: &mut Job,
        sink: &S,
        phase: Phase,
        message: impl Into<String>,
    ) -> Result<(), CampaignError> {
        self.checkpoint()?;
        job.phase = Some(phase);
        info!(job_id = %job.id, phase = %phase, "phase {}/{}", phase.number(), Phase::ALL.len());
        job.emit(sink, StatusEvent::status(phase.slug(), message));
        Ok(())
    }

    fn progress<S: EventSink + ?Sized>(job: &mut Job, sink: &S, message: impl Into<String>) {
        let status = job.phase.map(Phase::slug).unwrap_or("started");
        job.emit(sink, StatusEvent::status(status, message));
    }

    fn finish<S: EventSink + ?Sized>(job: &mut Job, sink: &S, phase: Phase, summary: &str) {
        job.emit(
            sink,
            StatusEvent::status(
                phase.slug(),
                format!(
                    "Phase {}/{} complete: {summary}",
                    phase.number(),
                    Phase::ALL.len()
                ),
            ),
        );
    }

    async fn value_propositions<S: EventSink + ?Sized>(
        &self,
        job: &mut Job,
        sink: &S,
    ) -> Result<Vec<ProductAngle>, CampaignError> {
        let phase = Phase::ValuePropositions;
        self.begin(
            job,
            sink,
            phase,
            "Generating candidate value propositions for the marketing campaign",
        )?;

        let response: AngleCandidates = self
            .reasoning
            .query_object(
                PromptArgs::new()
                    .arg("PRODUCT_DESCRIPTION", &job.product_description)
                    .task(format!(
                        "List {} suitable marketing angles given the PRODUCT_DESCRIPTION.",
                        self.limits.max_angles
                    )),
            )
            .await?;

        let mut angles = response.candidates;
        angles.truncate(self.limits.max_angles);
        if angles.is_empty() {
            return Err(CampaignError::Provider(
                "no value propositions returned".into(),
            ));
        }

        let summary = angles
            .iter()
            .map(|a| a.value_proposition.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self::finish(job, sink, phase, &format!("marketing angles: {summary}"));
        Ok(angles)
    }

    async fn audience<S: EventSink + ?Sized>(
        &self,
        job: &mut Job,
        sink: &S,
        angles: Vec<ProductAngle>,
    ) -> Result<Vec<AngleResearch>, CampaignError> {
        let phase = Phase::Audience;
        self.begin(job, sink, phase, "Researching markets and audiences")?;

        let mut research = Vec::with_capacity(angles.len());
        for angle in angles {
            Self::progress(
                job,
                sink,
                format!(
                    "Identifying a candidate market for value proposition: {}",
                    angle.value_proposition
                ),
            );
            let markets: MarketAnalysis = self
                .research
                .query_object(
                    PromptArgs::new()
                        .arg("VALUE_PROPOSITION", &angle.value_proposition)
                        .arg("USAGE_MODEL", &angle.usage)
                        .task(
                            "Using available market research, suggest a suitable market where \
                             VALUE_PROPOSITION through USAGE_MODEL would be useful.",
                        ),
                )
                .await?;

            Self::progress(
                job,
                sink,
                format!(
                    "Identifying candidate audience for value proposition: {}",
                    angle.value_proposition
                ),
            );
            let audiences: AudienceAnalysis = self
                .reasoning
                .query_object(
                    PromptArgs::new()
                        .arg("PROBLEM_STATEMENT", &angle.problem_addressed)
                        .arg("USAGE", &angle.usage)
                        .task(
                            "Suggest a suitable target audience for the PROBLEM_STATEMENT with \
                             the USAGE model.",
                        ),
                )
                .await?;

            let mut markets = markets.markets;
            markets.truncate(self.limits.max_markets);
            let mut audiences: Vec<Audience> =
                audiences.audiences.into_iter().map(Audience::from).collect();
            audiences.truncate(self.limits.max_audiences);

            research.push(AngleResearch {
                angle,
                markets,
                audiences,
            });
        }

        let markets: usize = research.iter().map(|r| r.markets.len()).sum();
        let audiences: usize = research.iter().map(|r| r.audiences.len()).sum();
        Self::finish(
            job,
            sink,
            phase,
            &format!("{markets} markets and {audiences} audiences identified"),
        );
        Ok(research)
    }

    async fn channels<S: EventSink + ?Sized>(
        &self,
        job: &mut Job,
        sink: &S,
        research: Vec<AngleResearch>,
    ) -> Result<Vec<Targeting>, CampaignError> {
        let phase = Phase::Channels;
        self.begin(job, sink, phase, "Identifying candidate channels")?;
        let formats = self.registry.formats();

        let mut targeting = Vec::new();
        for r in &research {
            for market in &r.markets {
                for audience in &r.audiences {
                    Self::progress(
                        job,
                        sink,
                        format!(
                            "Identifying candidate channels for reaching the {} audience in the \
                             {} market with value proposition: {}",
                            audience.profile, market.market_description, r.angle.value_proposition
                        ),
                    );
                    let response: ChannelSuggestions = self
                        .reasoning
                        .query_object(
                            PromptArgs::new()
                                .arg("VALUE_PROPOSITION", &r.angle.value_proposition)
                                .arg("AUDIENCE_PROFILE", &audience.profile)
                                .arg("MARKET", market)
                                .arg("DEMOGRAPHICS", &audience.demographics)
                                .arg("COPY_FORMATS", &formats)
                                .task(
                                    "Suggest some channels for reaching the DEMOGRAPHICS with \
                                     VALUE_PROPOSITION in MARKET. Each channel must use one of \
                                     the COPY_FORMATS.",
                                ),
                        )
                        .await?;

                    let mut channels = response.channels;
                    channels.truncate(self.limits.max_channels);
                    targeting.push(Targeting {
                        angle: r.angle.clone(),
                        audience: audience.clone(),
                        channels,
                    });
                }
            }
        }

        let total: usize = targeting.iter().map(|t| t.channels.len()).sum();
        Self::finish(job, sink, phase, &format!("{total} candidate channels"));
        Ok(targeting)
    }

    async fn content_strategy<S: EventSink + ?Sized>(
        &self,
        job: &mut Job,
        sink: &S,
        targeting: Vec<Targeting>,
    ) -> Result<Vec<CopyContext>, CampaignError> {
        let phase = Phase::ContentStrategy;
        self.begin(job, sink, phase, "Generating content strategies")?;

        let mut briefs = Vec::new();
        for t in targeting {
            for channel in t.channels {
                if !self.registry.contains(&channel.copy_format) {
                    warn!(
                        job_id = %job.id,
                        format = %channel.copy_format,
                        "unregistered copy format skipped"
                    );
                    Self::progress(
                        job,
                        sink,
                        format!("Copy type not supported for {}", channel.name),
                    );
                    continue;
                }

                Self::progress(
                    job,
                    sink,
                    format!(
                        "Generating strategy and evaluation criteria for {} marketing",
                        channel.name
                    ),
                );
                let strategy: CopyStrategy = self
                    .reasoning
                    .query_object(
                        PromptArgs::new()
                            .arg("PROBLEM_STATEMENT", &t.angle.problem_addressed)
                            .arg("VALUE_PROPOSITION", &t.angle.value_proposition)
                            .arg("DEMOGRAPHICS", &t.audience.demographics)
                            .arg("CHANNEL", &channel.name)
                            .arg("COPY_FORMAT", &channel.copy_format)
                            .task(
                                "Generate a strategy for generating a COPY_FORMAT for the \
                                 VALUE_PROPOSITION targeting the DEMOGRAPHICS through the CHANNEL, \
                                 and suggest review criteria for making sure the COPY_FORMAT is good.",
                            ),
                    )
                    .await?;

                briefs.push(CopyContext {
                    product_description: job.product_description.clone(),
                    angle: t.angle.clone(),
                    audience: t.audience.clone(),
                    channel,
                    strategy,
                });
            }
        }

        if briefs.is_empty() {
            warn!(job_id = %job.id, "no channel matched a registered copy format");
        }
        Self::finish(
            job,
            sink,
            phase,
            &format!("{} copy briefs ready", briefs.len()),
        );
        Ok(briefs)
    }

    async fn copy_generation<S: EventSink + ?Sized>(
        &self,
        job: &mut Job,
        sink: &S,
        briefs: Vec<CopyContext>,
    ) -> Result<(), CampaignError> {
        let phase = Phase::CopyGeneration;
        self.begin(job, sink, phase, "Creating copy")?;
        // revisions > 1 时追加 revisions 轮改写；1 表示只出初稿
        let refinements = if job.config.revisions > 1 {
            job.config.revisions
        } else {
            0
        };

        for ctx in briefs {
            self.checkpoint()?;
            let plugin = self.registry.get(&ctx.channel.copy_format).ok_or_else(|| {
                CampaignError::Provider(format!(
                    "copy format {} is no longer registered",
                    ctx.channel.copy_format
                ))
            })?;

            Self::progress(
                job,
                sink,
                format!("Creating copy for {} marketing", ctx.channel.name),
            );
            let mut draft = plugin.produce_draft(&self.reasoning, &ctx).await?;

            for pass in 1..=refinements {
                self.checkpoint()?;
                Self::progress(
                    job,
                    sink,
                    format!(
                        "Revising {} copy ({pass}/{refinements})",
                        ctx.channel.name
                    ),
                );
                let feedback =
                    evaluate_draft(&self.reasoning, &ctx, plugin.as_ref(), &draft).await?;
                draft = plugin.refine(&self.reasoning, &ctx, &draft, &feedback).await?;
            }

            info!(
                job_id = %job.id,
                resource_type = draft.resource_type(),
                title = %draft.title,
                "copy created"
            );
            job.artifacts.push(draft.clone());
            job.emit(sink, StatusEvent::ResourceCreated(draft));
        }

        let count = job.artifacts.len();
        Self::finish(
            job,
            sink,
            phase,
            &format!("{count} pieces of copy generated"),
        );
        Ok(())
    }
}
