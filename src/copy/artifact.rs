//! 成品文案（Artifact / Resource）
//!
//! 每个渠道一种元数据结构；`ArtifactMetadata` 以 resource_type 为标签，序列化后为
//! `{resource_type, title, content, metadata}`，与状态通道的 resource_created 负载一致。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LinkedInPost {
    pub title: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub image_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Email {
    pub subject: String,
    pub attachment_descriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Tweet {
    pub hook: String,
    pub tweet: String,
    /// Describe a catchy image to include with the tweet.
    pub image_description: Option<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlogPost {
    pub title: String,
    pub subtitle: String,
    pub image_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PressRelease {
    pub title: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GithubProject {
    pub project_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoScript {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub thumbnail_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TwitterThread {
    /// Describe a catchy image to include in the thread.
    pub image_description: Option<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
}

/// 推文串的正文（结构化内容，而不是 markdown）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TweetList {
    pub tweets: Vec<ThreadTweet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThreadTweet {
    pub tweet: String,
}

/// 渠道元数据的标签联合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource_type", content = "metadata")]
pub enum ArtifactMetadata {
    LinkedInPost(LinkedInPost),
    Email(Email),
    Tweet(Tweet),
    BlogPost(BlogPost),
    PressRelease(PressRelease),
    GithubProject(GithubProject),
    VideoScript(VideoScript),
    TwitterThread(TwitterThread),
}

macro_rules! metadata_from {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for ArtifactMetadata {
                fn from(m: $variant) -> Self {
                    ArtifactMetadata::$variant(m)
                }
            }
        )+
    };
}

metadata_from!(
    LinkedInPost,
    Email,
    Tweet,
    BlogPost,
    PressRelease,
    GithubProject,
    VideoScript,
    TwitterThread,
);

impl ArtifactMetadata {
    pub fn resource_type(&self) -> &'static str {
        match self {
            ArtifactMetadata::LinkedInPost(_) => "LinkedInPost",
            ArtifactMetadata::Email(_) => "Email",
            ArtifactMetadata::Tweet(_) => "Tweet",
            ArtifactMetadata::BlogPost(_) => "BlogPost",
            ArtifactMetadata::PressRelease(_) => "PressRelease",
            ArtifactMetadata::GithubProject(_) => "GithubProject",
            ArtifactMetadata::VideoScript(_) => "VideoScript",
            ArtifactMetadata::TwitterThread(_) => "TwitterThread",
        }
    }

    /// 仅元数据字段（不含标签），用于修订提示
    pub fn fields(&self) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("metadata").map(Value::take))
            .unwrap_or(Value::Null)
    }
}

/// 一条成品文案；创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub title: String,
    pub content: String,
    #[serde(flatten)]
    pub metadata: ArtifactMetadata,
}

impl Artifact {
    pub fn resource_type(&self) -> &'static str {
        self.metadata.resource_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Artifact {
        Artifact {
            title: "Hello".into(),
            content: "Body".into(),
            metadata: Email {
                subject: "Hello".into(),
                attachment_descriptions: vec!["chart".into()],
            }
            .into(),
        }
    }

    #[test]
    fn test_wire_shape() {
        let v = serde_json::to_value(email()).unwrap();
        assert_eq!(v["resource_type"], "Email");
        assert_eq!(v["title"], "Hello");
        assert_eq!(v["content"], "Body");
        assert_eq!(v["metadata"]["subject"], "Hello");
        assert_eq!(v["metadata"]["attachment_descriptions"][0], "chart");
    }

    #[test]
    fn test_fields_strip_tag() {
        let fields = email().metadata.fields();
        assert_eq!(fields["subject"], "Hello");
        assert!(fields.get("resource_type").is_none());
    }
}
