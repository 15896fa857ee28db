//! 博客写作工作流（调研 / 编辑 / 写作）
//!
//! 状态机：Researching -> Editing -> (Researching | Writing) -> Done。
//! 编辑最多放行 3 轮调研，第 3 轮起直接进入写作，保证有界终止。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;

use crate::core::CampaignError;
use crate::llm::StructuredLlm;
use crate::memory::Message;
use crate::search::SearchProvider;

/// 调研轮数上限
pub const MAX_ITERATIONS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlogState {
    Researching,
    Editing,
    Writing,
    Done,
}

/// 工作流产出
#[derive(Debug, Clone, Serialize)]
pub struct BlogOutcome {
    pub content: String,
    pub iterations: u32,
    pub queries: Vec<String>,
}

pub struct BlogWorkflow {
    llm: StructuredLlm,
    search: Arc<dyn SearchProvider>,
}

impl BlogWorkflow {
    pub fn new(llm: StructuredLlm, search: Arc<dyn SearchProvider>) -> Self {
        Self { llm, search }
    }

    pub async fn run(&self, query: &str) -> Result<BlogOutcome, CampaignError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CampaignError::Validation("query must not be empty".into()));
        }

        let mut queries = vec![query.to_string()];
        let mut research: Vec<String> = Vec::new();
        let mut iteration = 1;
        let mut content = String::new();
        let mut state = BlogState::Researching;

        while state != BlogState::Done {
            tracing::debug!(state = ?state, iteration, "blog workflow step");
            state = match state {
                BlogState::Researching => {
                    let latest = queries.last().map(String::as_str).unwrap_or(query);
                    research.push(self.research(latest).await?);
                    BlogState::Editing
                }
                BlogState::Editing => {
                    if iteration >= MAX_ITERATIONS {
                        BlogState::Writing
                    } else {
                        match self.edit(&queries, &research).await? {
                            Some(next) => {
                                queries.push(next);
                                iteration += 1;
                                BlogState::Researching
                            }
                            None => BlogState::Writing,
                        }
                    }
                }
                BlogState::Writing => {
                    content = self.write(query, &research).await?;
                    BlogState::Done
                }
                BlogState::Done => BlogState::Done,
            };
        }

        tracing::info!(iterations = iteration, queries = queries.len(), "blog post written");
        Ok(BlogOutcome {
            content,
            iterations: iteration,
            queries,
        })
    }

    /// 优化查询后搜索，取排名第一的摘要
    async fn research(&self, query: &str) -> Result<String, CampaignError> {
        let prompt = format!(
            "You are an expert at optimizing search queries for Google. Your task is to take a \
             given query and return an optimized version of it, making it more likely to yield \
             relevant results. Do not include any explanations or extra text, only the optimized \
             query.\n\n\
             Example:\nOriginal: best laptop 2023 for programming\nOptimized: top laptops 2023 for coding\n\n\
             Example:\nOriginal: how to train a puppy not to bite\nOptimized: puppy training tips to prevent biting\n\n\
             Now optimize the following query:\nOriginal: {query}\nOptimized:"
        );
        let optimized = self.llm.complete(&[Message::user(prompt)]).await?;
        let optimized = optimized.trim();
        let optimized = if optimized.is_empty() { query } else { optimized };

        let snippets = self.search.search(optimized).await?;
        snippets
            .into_iter()
            .next()
            .map(|s| s.content)
            .ok_or_else(|| CampaignError::Provider(format!("no search results for: {optimized}")))
    }

    /// 返回 Some(新查询) 表示调研不足
    async fn edit(
        &self,
        queries: &[String],
        research: &[String],
    ) -> Result<Option<String>, CampaignError> {
        let prompt = format!(
            "You are an expert editor. Your task is to evaluate the research based on the query. \
             If the information is sufficient to create a comprehensive and accurate blog post, \
             respond with 'sufficient'. If the information is not sufficient, respond with \
             'insufficient' and provide a new, creative query suggestion to improve the results. \
             If the research results appear repetitive or not diverse enough, think about a very \
             different kind of question that could yield more varied and relevant information.\n\n\
             Example 1:\nUsed queries: What are the benefits of a Mediterranean diet?\n\
             Research: The Mediterranean diet includes fruits, vegetables, whole grains, and healthy fats.\n\
             Evaluation: Insufficient\nNew query: Detailed health benefits of a Mediterranean diet\n\n\
             Example 2:\nUsed queries: How does solar power work?\n\
             Research: Solar power works by converting sunlight into electricity using photovoltaic cells.\n\
             Evaluation: Sufficient\n\n\
             Now evaluate the following:\nUsed queries: {}\nResearch: {}\n\n\
             Evaluation (sufficient/insufficient):\nNew query (if insufficient):",
            queries.join("\n"),
            research.join("\n")
        );
        let evaluation = self.llm.complete(&[Message::user(prompt)]).await?;
        Ok(parse_new_query(&evaluation))
    }

    async fn write(&self, query: &str, research: &[String]) -> Result<String, CampaignError> {
        let prompt = format!(
            "You are an expert blog post writer. Your task is to take a given query and context, \
             and write a comprehensive, engaging, and informative short blog post about it. Make \
             sure to include an introduction, main body with detailed information, and a \
             conclusion.\n\nQuery: {query}\n\nContext:\n{}\n\n\
             Write a detailed and engaging blog post based on the above query and context.",
            research.join("\n")
        );
        let content = self.llm.complete(&[Message::user(prompt)]).await?;
        Ok(content.trim().to_string())
    }
}

/// 编辑回复中 `New query:` 之后的第一行非空文本
fn parse_new_query(evaluation: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re =
        RE.get_or_init(|| Regex::new(r"(?i)new query:\s*(\S.*)").expect("valid query regex"));
    re.captures(evaluation).map(|c| c[1].trim().to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::search::{SearchSnippet, StaticSearch};

    fn workflow(mock: ScriptedLlmClient) -> (BlogWorkflow, Arc<ScriptedLlmClient>) {
        let mock = Arc::new(mock);
        let llm = StructuredLlm::new(mock.clone(), Duration::from_secs(5));
        (
            BlogWorkflow::new(llm, Arc::new(StaticSearch::default())),
            mock,
        )
    }

    #[test]
    fn test_parse_new_query() {
        assert_eq!(
            parse_new_query("Evaluation: Insufficient\nNew query: polar bear adaptation\n"),
            Some("polar bear adaptation".to_string())
        );
        assert_eq!(
            parse_new_query("Insufficient. new query:\n\n  deeper angle"),
            Some("deeper angle".to_string())
        );
        assert_eq!(parse_new_query("Evaluation: Sufficient"), None);
        assert_eq!(parse_new_query("New query:   "), None);
    }

    #[test]
    fn test_parse_new_query_non_ascii() {
        assert_eq!(parse_new_query("İİ New query: éé"), Some("éé".to_string()));
        assert_eq!(
            parse_new_query("Évaluation : insuffisant\nNEW QUERY: Énergie solaire à Zürich\n"),
            Some("Énergie solaire à Zürich".to_string())
        );
    }

    #[tokio::test]
    async fn test_sufficient_research_writes_immediately() {
        let (wf, mock) = workflow(ScriptedLlmClient::campaign());
        let outcome = wf.run("fast inference").await.unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.queries, vec!["fast inference"]);
        assert!(outcome.content.starts_with("# Fast inference"));
        // 优化查询、编辑、写作各一次
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_editor_loop_is_capped() {
        let mock = ScriptedLlmClient::new()
            .rule(
                "You are an expert editor",
                Ok("Evaluation: Insufficient\nNew query: dig deeper".into()),
            )
            .merge(ScriptedLlmClient::campaign());
        let (wf, _) = workflow(mock);
        let outcome = wf.run("fast inference").await.unwrap();
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert_eq!(outcome.queries.len(), MAX_ITERATIONS as usize);
        assert_eq!(outcome.queries[1], "dig deeper");
        assert!(!outcome.content.is_empty());
    }

    #[tokio::test]
    async fn test_writer_gets_top_ranked_snippet() {
        let snippet = |content: &str| SearchSnippet {
            title: "t".into(),
            url: "https://example.com".into(),
            content: content.into(),
        };
        let mock = Arc::new(ScriptedLlmClient::campaign());
        let llm = StructuredLlm::new(mock.clone(), Duration::from_secs(5));
        let search = StaticSearch::new(vec![snippet("ranked first"), snippet("ranked second")]);
        let wf = BlogWorkflow::new(llm, Arc::new(search));
        wf.run("fast inference").await.unwrap();

        let calls = mock.calls();
        let writer = &calls.last().unwrap()[0].content;
        assert!(writer.contains("You are an expert blog post writer"));
        assert!(writer.contains("ranked first"));
        assert!(!writer.contains("ranked second"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (wf, mock) = workflow(ScriptedLlmClient::campaign());
        let err = wf.run("   ").await.unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
