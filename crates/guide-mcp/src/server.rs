/// MCP server implementation for the guide corpus.
///
/// Exposes five tools:
/// - `search_guides`: Full-text search over guides and their steps
/// - `get_guide`: Fetch one guide with its steps by slug
/// - `list_guides`: List published guides, optionally by tag
/// - `get_llms_txt`: Render the llms.txt export
/// - `update_index`: Rebuild the search index if content changed
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::info;

use guide_core::api::{
    effective_limit, GetGuideParams, GuideListResponse, ListGuidesParams, LlmsTxtResponse,
    SearchGuidesParams, SearchGuidesResponse, UpdateIndexResponse,
};
use guide_core::config::Config;
use guide_core::llms_txt::LlmsTxtGenerator;
use guide_core::loader::{self, GuideLoader};
use guide_core::model::Guide;
use guide_core::update::UpdateService;

#[derive(Clone)]
pub struct GuideMcpServer {
    loader: GuideLoader,
    update_service: Arc<UpdateService>,
    llms_txt: Option<LlmsTxtGenerator>,
    tool_router: ToolRouter<GuideMcpServer>,
}

impl GuideMcpServer {
    pub fn new(config: &Config, update_service: Arc<UpdateService>) -> Self {
        Self {
            loader: GuideLoader::from_config(config),
            update_service,
            llms_txt: config
                .llms_txt
                .enabled
                .then(|| LlmsTxtGenerator::from_config(config)),
            tool_router: Self::tool_router(),
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("background task failed: {e}"))
}

#[tool_router]
impl GuideMcpServer {
    #[tool(description = "Search guides and their individual steps. Every query word must match the start of a word in a guide title, description, step title or step content. Step hits carry stepId and stepTitle.")]
    async fn search_guides(
        &self,
        Parameters(params): Parameters<SearchGuidesParams>,
    ) -> Result<Json<SearchGuidesResponse>, String> {
        let query = params.query.trim().to_string();
        if query.is_empty() {
            return Ok(Json(SearchGuidesResponse {
                results: Vec::new(),
            }));
        }

        self.update_service
            .ensure_index()
            .await
            .map_err(|e| format!("search index unavailable: {e}"))?;

        let limit = effective_limit(params.limit);
        let index = Arc::clone(self.update_service.index());
        let results = blocking(move || index.search(&query, limit)).await?;

        Ok(Json(SearchGuidesResponse { results }))
    }

    #[tool(description = "Get a guide by slug (its directory name, e.g. 'getting-started'), including metadata, ordered steps and the raw markdown body.")]
    async fn get_guide(
        &self,
        Parameters(params): Parameters<GetGuideParams>,
    ) -> Result<Json<Guide>, String> {
        let slug = params.slug.trim().to_string();
        if slug.is_empty() {
            return Err("slug must not be empty".to_string());
        }

        let guide_loader = self.loader.clone();
        let lookup = slug.clone();
        blocking(move || guide_loader.load_by_slug(&lookup))
            .await?
            .map(Json)
            .ok_or_else(|| format!("guide not found: {slug}"))
    }

    #[tool(description = "List published guides with their metadata. Optionally restrict to guides carrying a tag. Also returns every known tag.")]
    async fn list_guides(
        &self,
        Parameters(params): Parameters<ListGuidesParams>,
    ) -> Result<Json<GuideListResponse>, String> {
        let guide_loader = self.loader.clone();
        let items = blocking(move || guide_loader.list_published()).await?;
        let tags = loader::all_tags(&items);

        let selected: Vec<String> = params
            .tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .into_iter()
            .collect();

        Ok(Json(GuideListResponse {
            guides: loader::filter_by_tags(items, &selected),
            tags,
        }))
    }

    #[tool(description = "Render the llms.txt export: a plain-text site map of every published guide with its steps.")]
    async fn get_llms_txt(&self) -> Result<Json<LlmsTxtResponse>, String> {
        let generator = self
            .llms_txt
            .clone()
            .ok_or_else(|| "llms.txt is disabled".to_string())?;

        let guide_loader = self.loader.clone();
        let content = blocking(move || {
            let guides = guide_loader.load_all_published_with_content();
            generator.generate(&guides)
        })
        .await?;

        Ok(Json(LlmsTxtResponse { content }))
    }

    #[tool(description = "Rebuild the guide search index if the content directory changed since the last build.")]
    async fn update_index(&self) -> Result<Json<UpdateIndexResponse>, String> {
        info!("update_index tool invoked");

        let result = self
            .update_service
            .update()
            .await
            .map_err(|e| format!("update failed: {e}"))?;

        Ok(Json(result.into()))
    }
}

#[tool_handler]
impl ServerHandler for GuideMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "guide-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Step-by-step guide server. Use search_guides for free-text queries \
                 (results point at a guide or a single step), get_guide to read a guide \
                 by slug, list_guides to browse by tag, get_llms_txt for a plain-text \
                 export of the whole corpus, and update_index after content changes."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use guide_core::search::SearchIndex;

    use super::*;

    #[test]
    fn tools_publish_output_schemas() {
        let tools = GuideMcpServer::tool_router().list_all();
        for name in [
            "search_guides",
            "get_guide",
            "list_guides",
            "get_llms_txt",
            "update_index",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    fn write_guide(root: &Path, slug: &str, text: &str) {
        let dir = root.join(slug);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page.mdx"), text).unwrap();
    }

    fn server(root: &Path, llms_txt_enabled: bool) -> GuideMcpServer {
        let root = root.display().to_string();
        let enabled = llms_txt_enabled.to_string();
        let config = Config::from_lookup(|key| match key {
            "GUIDES_CONTENT_DIR" => Some(root.clone()),
            "GUIDES_LLMS_TXT_ENABLED" => Some(enabled.clone()),
            _ => None,
        })
        .unwrap();
        let index = Arc::new(SearchIndex::new().unwrap());
        let update_service = Arc::new(UpdateService::new(GuideLoader::from_config(&config), index));
        GuideMcpServer::new(&config, update_service)
    }

    fn corpus() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write_guide(
            tmp.path(),
            "caching",
            "---\ntitle: Caching\ntags: [perf]\n---\n## Warm the cache\nPreload hot keys.\n",
        );
        write_guide(
            tmp.path(),
            "logging",
            "---\ntitle: Logging\ntags: [ops]\n---\n## Set the level\nUse RUST_LOG.\n",
        );
        tmp
    }

    #[tokio::test]
    async fn search_tool_finds_steps() {
        let tmp = corpus();
        let server = server(tmp.path(), true);
        let Json(response) = server
            .search_guides(Parameters(SearchGuidesParams {
                query: "preload".to_string(),
                limit: None,
            }))
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].slug, "caching");
        assert_eq!(response.results[0].step_id.as_deref(), Some("warm-the-cache"));
    }

    #[tokio::test]
    async fn search_tool_blank_query() {
        let tmp = corpus();
        let server = server(tmp.path(), true);
        let Json(response) = server
            .search_guides(Parameters(SearchGuidesParams {
                query: "  ".to_string(),
                limit: Some(5),
            }))
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert!(!server.update_service.index().is_built());
    }

    #[tokio::test]
    async fn get_guide_tool() {
        let tmp = corpus();
        let server = server(tmp.path(), true);
        let Json(guide) = server
            .get_guide(Parameters(GetGuideParams {
                slug: "logging".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(guide.metadata.title, "Logging");
        assert_eq!(guide.steps[0].id, "set-the-level");

        let err = server
            .get_guide(Parameters(GetGuideParams {
                slug: "missing".to_string(),
            }))
            .await
            .err().unwrap();
        assert!(err.contains("missing"));
    }

    #[tokio::test]
    async fn list_guides_tool_filters_by_tag() {
        let tmp = corpus();
        let server = server(tmp.path(), true);
        let Json(all) = server
            .list_guides(Parameters(ListGuidesParams::default()))
            .await
            .unwrap();
        assert_eq!(all.guides.len(), 2);
        assert_eq!(all.tags, vec!["ops", "perf"]);

        let Json(ops) = server
            .list_guides(Parameters(ListGuidesParams {
                tag: Some("ops".to_string()),
            }))
            .await
            .unwrap();
        assert_eq!(ops.guides.len(), 1);
        assert_eq!(ops.guides[0].slug, "logging");
        assert_eq!(ops.tags.len(), 2);
    }

    #[tokio::test]
    async fn llms_txt_tool() {
        let tmp = corpus();
        let Json(response) = server(tmp.path(), true).get_llms_txt().await.unwrap();
        assert!(response.content.contains("- [Caching](#caching)"));
        assert!(response.content.contains("1. Set the level"));

        let err = server(tmp.path(), false).get_llms_txt().await.err().unwrap();
        assert_eq!(err, "llms.txt is disabled");
    }

    #[tokio::test]
    async fn update_index_tool() {
        let tmp = corpus();
        let server = server(tmp.path(), true);
        let Json(first) = server.update_index().await.unwrap();
        assert!(first.updated);
        assert_eq!(first.document_count, 4);

        let Json(second) = server.update_index().await.unwrap();
        assert!(!second.updated);
        assert_eq!(second.fingerprint, first.fingerprint);
    }
}
