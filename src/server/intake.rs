//! 任务受理：校验请求、分配 job_id、登记状态通道、启动流水线
//!
//! 校验失败时不创建任务也不创建通道。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::campaign::{CampaignPipeline, Job, JobConfig, StatusEvent};
use crate::config::{LlmSection, ServerSection};
use crate::core::CampaignError;
use crate::llm::Provider;
use crate::server::http::AppState;
use crate::server::jobs::JobHandle;

/// POST /generate 请求体
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub revisions: Option<u32>,
    #[serde(default)]
    pub search: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub job_id: String,
}

/// 校验并归一化为 (产品描述, 任务配置)
pub fn validate(
    req: GenerateRequest,
    server: &ServerSection,
    llm: &LlmSection,
) -> Result<(String, JobConfig), CampaignError> {
    let description = req.product_description.trim();
    if description.is_empty() {
        return Err(CampaignError::Validation(
            "product_description must not be empty".into(),
        ));
    }

    let provider: Provider = req
        .provider
        .as_deref()
        .unwrap_or(&llm.default_provider)
        .parse()
        .map_err(CampaignError::Validation)?;

    let revisions = req.revisions.unwrap_or(1);
    if revisions == 0 || revisions > server.max_revisions {
        return Err(CampaignError::Validation(format!(
            "revisions must be between 1 and {}",
            server.max_revisions
        )));
    }

    let model = req
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    Ok((
        description.to_string(),
        JobConfig {
            provider,
            model,
            revisions,
            search: req.search.unwrap_or(false),
        },
    ))
}

/// 登记任务并在后台运行流水线，立即返回句柄
pub async fn start_job(
    state: &Arc<AppState>,
    product_description: String,
    config: JobConfig,
) -> Arc<JobHandle> {
    let handle = state.jobs.create(state.shutdown.job_token()).await;
    tracing::info!(
        job_id = %handle.id,
        provider = %config.provider,
        revisions = config.revisions,
        search = config.search,
        "job accepted"
    );

    let state = Arc::clone(state);
    let task_handle = Arc::clone(&handle);
    tokio::spawn(async move {
        let mut job = Job::with_id(task_handle.id.clone(), product_description, config);
        let channel = task_handle.channel.as_ref();
        match CampaignPipeline::from_factory(
            state.factory.as_ref(),
            &job.config,
            Arc::clone(&state.registry),
            state.config.campaign.clone(),
            Duration::from_secs(state.config.llm.timeouts.request),
            task_handle.cancel.clone(),
        ) {
            Ok(pipeline) => pipeline.run(&mut job, channel).await,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "job could not start");
                job.emit(channel, StatusEvent::error(e.to_string()));
            }
        }
        state.jobs.mark_finished(&job.id).await;
    });

    handle
}
