use std::sync::Arc;

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    composer::{AnswerComposer, RagQueryRequest},
    config,
    document::{Contributor, DocType},
    error,
    search::DEFAULT_SEARCH_LIMIT,
    text_util::{add_line_numbers, extract_snippet, snippet_terms},
};

#[derive(Clone)]
pub struct PipelineMcpServer {
    composer: Arc<AnswerComposer>,
    tool_router: ToolRouter<Self>,
}

impl PipelineMcpServer {
    pub fn new(composer: AnswerComposer) -> Self {
        Self {
            composer: Arc::new(composer),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl PipelineMcpServer {
    /// Rank knowledge base documents against a query.
    #[tool(
        name = "pipeline_search",
        description = "Search the pipeline documentation. Mention maria or victoria to prefer one contributor's work."
    )]
    pub async fn pipeline_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let include_snippet = params.include_snippet.unwrap_or(true);
        let terms = snippet_terms(&params.query);

        let items: Vec<SearchResultItem> = self
            .composer
            .knowledge_base()
            .search(&params.query, limit)
            .into_iter()
            .map(|scored| {
                let doc = scored.document;
                let snippet = include_snippet
                    .then(|| extract_snippet(&doc.content, &terms))
                    .flatten()
                    .map(|(snippet, start_line)| {
                        add_line_numbers(&snippet, start_line)
                    });
                SearchResultItem {
                    doc_id: doc.id,
                    title: doc.title.clone(),
                    doc_type: doc.doc_type,
                    contributor: doc.contributor,
                    source: doc.source.clone(),
                    relevance_score: scored.relevance_score,
                    snippet,
                }
            })
            .collect();

        let summary = format_search_summary(&items, &params.query);
        let structured = serde_json::to_value(SearchResponse {
            query: params.query,
            result_count: items.len(),
            results: items,
        })
        .map_err(|e| mcp_error("failed to serialize search results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Answer a question with cited sources.
    #[tool(
        name = "pipeline_ask",
        description = "Answer a question about the emissions pipeline, citing the documents used. Victoria's work is the primary source."
    )]
    pub async fn pipeline_ask(
        &self,
        params: Parameters<RagQueryRequest>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let response = self
            .composer
            .answer(&params.0)
            .await
            .map_err(|e| match e {
                error::Error::InvalidRequest(message) => {
                    rmcp::ErrorData::invalid_params(message, None)
                }
                other => mcp_error("failed to process query", other),
            })?;

        let structured = serde_json::to_value(&response)
            .map_err(|e| mcp_error("failed to serialize answer", e))?;

        let mut result = CallToolResult::success(vec![Content::text(response.answer)]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for PipelineMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("pipeline-kb", env!("CARGO_PKG_VERSION"))
                    .with_title("pipeline-kb MCP"),
            )
            .with_instructions(
                "Use pipeline_ask for answers with attribution, pipeline_search to inspect which documents match a query.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Search query string.
    pub query: String,
    /// Maximum number of results (default: 5).
    pub limit: Option<usize>,
    /// Include a snippet preview (default: true).
    pub include_snippet: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    query: String,
    result_count: usize,
    results: Vec<SearchResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultItem {
    doc_id: u32,
    title: String,
    doc_type: DocType,
    contributor: Contributor,
    source: String,
    relevance_score: f64,
    snippet: Option<String>,
}

fn format_search_summary(results: &[SearchResultItem], query: &str) -> String {
    if results.is_empty() {
        return format!("No results found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\":",
        results.len(),
        suffix
    ));

    for item in results {
        lines.push(format!(
            "#{} {:.3} [{} - {}] {}",
            item.doc_id,
            item.relevance_score,
            item.contributor,
            item.doc_type,
            item.title
        ));
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    let data = config::expose_error_detail()
        .then(|| json!({ "error": error.to_string() }));
    rmcp::ErrorData::internal_error(message.to_string(), data)
}

pub fn run_mcp(composer: AnswerComposer) -> error::Result<()> {
    let server = PipelineMcpServer::new(composer);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
