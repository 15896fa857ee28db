//! 文案插件：渠道元数据、生成 / 改写能力、按 copy_format 的注册表

pub mod artifact;
pub mod plugin;
pub mod registry;

pub use artifact::{Artifact, ArtifactMetadata};
pub use plugin::{evaluate_draft, ContentKind, CopyContext, CopyPlugin, StructuredCopyPlugin};
pub use registry::{builtin_plugins, CopyRegistry};
