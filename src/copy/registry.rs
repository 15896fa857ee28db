//! 文案插件注册表
//!
//! copy_format -> 插件。阶段 3 把已注册的格式列给 LLM 选择，阶段 4/5 按格式查找插件；
//! 未注册的格式在阶段 4 被跳过。

use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::copy::artifact::{
    ArtifactMetadata, BlogPost, Email, GithubProject, LinkedInPost, PressRelease, Tweet,
    TwitterThread, VideoScript,
};
use crate::copy::plugin::{ContentKind, CopyPlugin, StructuredCopyPlugin};

#[derive(Default, Clone)]
pub struct CopyRegistry {
    plugins: BTreeMap<String, Arc<dyn CopyPlugin>>,
}

impl CopyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置渠道全部注册
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for plugin in builtin_plugins() {
            registry.register(plugin);
        }
        registry
    }

    /// 按 format 注册；同名覆盖并返回旧插件
    pub fn register(&mut self, plugin: Arc<dyn CopyPlugin>) -> Option<Arc<dyn CopyPlugin>> {
        let format = plugin.format().to_string();
        tracing::debug!(format = %format, name = %plugin.name(), "copy plugin registered");
        self.plugins.insert(format, plugin)
    }

    pub fn get(&self, format: &str) -> Option<Arc<dyn CopyPlugin>> {
        self.plugins.get(format).cloned()
    }

    pub fn contains(&self, format: &str) -> bool {
        self.plugins.contains_key(format)
    }

    /// 已注册格式（有序）
    pub fn formats(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

fn plugin<M>(
    format: &'static str,
    name: &'static str,
    content: ContentKind,
    title: fn(&M) -> String,
) -> Arc<dyn CopyPlugin>
where
    M: DeserializeOwned + Serialize + JsonSchema + Into<ArtifactMetadata> + Send + Sync + 'static,
{
    Arc::new(StructuredCopyPlugin::new(format, name, content, title))
}

pub fn builtin_plugins() -> Vec<Arc<dyn CopyPlugin>> {
    vec![
        plugin::<LinkedInPost>(
            "LINKEDIN_POST",
            "LinkedIn post",
            ContentKind::Markdown,
            |m| m.title.clone(),
        ),
        plugin::<Email>(
            "EMAIL",
            "marketing email",
            ContentKind::Markdown,
            |m| m.subject.clone(),
        ),
        plugin::<Tweet>(
            "TWEET",
            "tweet",
            ContentKind::Markdown,
            |m| m.hook.clone(),
        ),
        plugin::<BlogPost>(
            "BLOG_POST",
            "blog post",
            ContentKind::Markdown,
            |m| m.title.clone(),
        ),
        plugin::<PressRelease>(
            "PRESS_RELEASE",
            "press release",
            ContentKind::Markdown,
            |m| m.title.clone(),
        ),
        plugin::<GithubProject>(
            "GITHUB_PROJECT",
            "GitHub project README",
            ContentKind::Markdown,
            |m| m.project_name.clone(),
        ),
        plugin::<VideoScript>(
            "VIDEO_SCRIPT",
            "YouTube video script",
            ContentKind::Markdown,
            |m| m.title.clone(),
        ),
        plugin::<TwitterThread>(
            "TWITTER_THREAD",
            "Twitter thread",
            ContentKind::Thread,
            |_| String::new(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::campaign::types::{
        Audience, AudienceKind, Channel, CopyStrategy, Evaluation, ProductAngle,
    };
    use crate::copy::artifact::TweetList;
    use crate::copy::plugin::{evaluate_draft, CopyContext};
    use crate::llm::{ScriptedLlmClient, StructuredLlm};

    fn context(format: &str) -> CopyContext {
        CopyContext {
            product_description: "A fast LLM inference API".into(),
            angle: ProductAngle {
                problem_addressed: "slow responses".into(),
                value_proposition: "instant answers".into(),
                usage: "REST".into(),
            },
            audience: Audience {
                kind: AudienceKind::EndUser,
                description: "devs".into(),
                profile: "indie developers".into(),
                profile_name: "Indie".into(),
                decision_maker: None,
                demographics: vec!["20-35".into()],
            },
            channel: Channel {
                name: "Channel".into(),
                description: "d".into(),
                copy_format: format.into(),
                pros: vec![],
                cons: vec![],
            },
            strategy: CopyStrategy {
                strategy: "benchmarks".into(),
                product_positioning: "fastest".into(),
                competitive_claim: "10x".into(),
                review_criteria: vec!["mentions speed".into()],
            },
        }
    }

    fn llm() -> StructuredLlm {
        StructuredLlm::new(
            Arc::new(ScriptedLlmClient::campaign()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_builtins_registered() {
        let registry = CopyRegistry::with_builtins();
        assert_eq!(registry.len(), 8);
        for format in ["LINKEDIN_POST", "EMAIL", "TWEET", "TWITTER_THREAD"] {
            assert!(registry.contains(format), "{format} missing");
        }
        assert!(registry.get("FAX").is_none());
    }

    #[tokio::test]
    async fn test_reregister_same_plugin_is_noop() {
        let mut registry = CopyRegistry::with_builtins();
        let before = registry.formats();
        let llm = llm();
        let ctx = context("EMAIL");
        let first = registry
            .get("EMAIL")
            .unwrap()
            .produce_draft(&llm, &ctx)
            .await
            .unwrap();

        let replaced = registry.register(Arc::new(StructuredCopyPlugin::<Email>::new(
            "EMAIL",
            "marketing email",
            ContentKind::Markdown,
            |m| m.subject.clone(),
        )));
        assert!(replaced.is_some());
        assert_eq!(registry.formats(), before);

        let second = registry
            .get("EMAIL")
            .unwrap()
            .produce_draft(&llm, &ctx)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_new_format_leaves_others_untouched() {
        let mut registry = CopyRegistry::new();
        registry.register(builtin_plugins().remove(2));
        let llm = llm();
        let ctx = context("TWEET");
        let before = registry
            .get("TWEET")
            .unwrap()
            .produce_draft(&llm, &ctx)
            .await
            .unwrap();

        registry.register(builtin_plugins().remove(0));
        assert_eq!(registry.formats(), vec!["LINKEDIN_POST", "TWEET"]);
        let after = registry
            .get("TWEET")
            .unwrap()
            .produce_draft(&llm, &ctx)
            .await
            .unwrap();
        assert_eq!(before, after);
        assert_eq!(after.resource_type(), "Tweet");
        assert_eq!(after.title, "Waiting on your LLM? Stop.");
    }

    #[tokio::test]
    async fn test_refine_replaces_draft() {
        let registry = CopyRegistry::with_builtins();
        let plugin = registry.get("LINKEDIN_POST").unwrap();
        let llm = llm();
        let ctx = context("LINKEDIN_POST");
        let draft = plugin.produce_draft(&llm, &ctx).await.unwrap();
        let feedback: Evaluation = evaluate_draft(&llm, &ctx, plugin.as_ref(), &draft)
            .await
            .unwrap();
        assert_eq!(feedback.suggestions.len(), 1);

        let refined = plugin.refine(&llm, &ctx, &draft, &feedback).await.unwrap();
        assert_eq!(refined.resource_type(), "LinkedInPost");
        assert!(refined.content.contains("waiting rooms"));
    }

    #[tokio::test]
    async fn test_thread_content_is_structured() {
        let mock = ScriptedLlmClient::new()
            .rule(
                "\"title\": \"TwitterThread\"",
                Ok("```json\n{\"image_description\": null, \"hashtags\": [], \"mentions\": []}\n```".into()),
            )
            .rule(
                "\"title\": \"TweetList\"",
                Ok("```json\n{\"tweets\": [{\"tweet\": \"1/ fast\"}, {\"tweet\": \"2/ cheap\"}]}\n```".into()),
            );
        let llm = StructuredLlm::new(Arc::new(mock), Duration::from_secs(5));
        let registry = CopyRegistry::with_builtins();
        let artifact = registry
            .get("TWITTER_THREAD")
            .unwrap()
            .produce_draft(&llm, &context("TWITTER_THREAD"))
            .await
            .unwrap();

        // 无标题字段时回退为插件名
        assert_eq!(artifact.title, "Twitter thread");
        let thread: TweetList = serde_json::from_str(&artifact.content).unwrap();
        assert_eq!(thread.tweets.len(), 2);
    }
}
