/// HTTP surface over the guide corpus.
///
/// Routes:
/// - `GET /api/guides[?tags=a,b]`: published guides, optionally tag-filtered
/// - `GET /api/guides/tags`: tag catalog
/// - `GET /api/guides/search?q=&limit=`: guide and step search
/// - `GET /api/guides/{slug}` and `/api/guides/{slug}/raw`: one guide
/// - `POST /api/guides/reindex`: refresh the search index
/// - `GET /llms.txt`, `GET /health`
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use guide_core::api::{effective_limit, UpdateIndexResponse};
use guide_core::config::Config;
use guide_core::error::GuideError;
use guide_core::llms_txt::LlmsTxtGenerator;
use guide_core::loader::{self, GuideLoader};
use guide_core::model::{Guide, GuideListItem, SearchResult};
use guide_core::search::SearchIndex;
use guide_core::update::UpdateService;

use crate::error::AppError;

const LLMS_TXT_CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=3600";

/// Per-process state shared by all handlers.
pub struct AppState {
    pub config: Config,
    pub loader: GuideLoader,
    pub update_service: UpdateService,
    pub llms_txt: LlmsTxtGenerator,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, GuideError> {
        let loader = GuideLoader::from_config(&config);
        let index = Arc::new(SearchIndex::new()?);
        let update_service = UpdateService::new(loader.clone(), index);
        let llms_txt = LlmsTxtGenerator::from_config(&config);
        Ok(Self {
            config,
            loader,
            update_service,
            llms_txt,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/guides", get(list_guides))
        .route("/api/guides/tags", get(list_tags))
        .route("/api/guides/search", get(search_guides))
        .route("/api/guides/reindex", post(reindex))
        .route("/api/guides/{slug}", get(get_guide))
        .route("/api/guides/{slug}/raw", get(get_guide_raw))
        .route("/llms.txt", get(llms_txt))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Run blocking file or index work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma-separated tag list; a guide matches if it has any of them.
    pub tags: Option<String>,
}

async fn list_guides(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<GuideListItem>>, AppError> {
    let tags: Vec<String> = query
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let guide_loader = state.loader.clone();
    let items = blocking(move || guide_loader.list_published()).await?;
    Ok(Json(loader::filter_by_tags(items, &tags)))
}

async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, AppError> {
    let guide_loader = state.loader.clone();
    let items = blocking(move || guide_loader.list_published()).await?;
    Ok(Json(loader::all_tags(&items)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    /// Parsed leniently: anything that is not a number means the default.
    pub limit: Option<String>,
}

async fn search_guides(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, AppError> {
    let q = query.q.unwrap_or_default();
    if q.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }

    state.update_service.ensure_index().await?;

    let limit = effective_limit(query.limit.as_deref().and_then(|l| l.trim().parse().ok()));
    let index = Arc::clone(state.update_service.index());
    let results = blocking(move || index.search(&q, limit)).await?;
    Ok(Json(results))
}

async fn load_guide(state: &AppState, slug: String) -> Result<Guide, AppError> {
    let guide_loader = state.loader.clone();
    let lookup = slug.clone();
    blocking(move || guide_loader.load_by_slug(&lookup))
        .await?
        .ok_or(AppError::NotFound(slug))
}

async fn get_guide(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Guide>, AppError> {
    Ok(Json(load_guide(&state, slug).await?))
}

async fn get_guide_raw(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let guide = load_guide(&state, slug).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        guide.raw_content,
    )
        .into_response())
}

async fn reindex(State(state): State<Arc<AppState>>) -> Result<Json<UpdateIndexResponse>, AppError> {
    info!("reindex requested");
    let result = state.update_service.update().await?;
    Ok(Json(result.into()))
}

async fn llms_txt(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    if !state.config.llms_txt.enabled {
        return Ok((StatusCode::NOT_FOUND, "llms.txt is disabled").into_response());
    }

    let guide_loader = state.loader.clone();
    let generator = state.llms_txt.clone();
    let content = blocking(move || {
        let guides = guide_loader.load_all_published_with_content();
        generator.generate(&guides)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, LLMS_TXT_CACHE_CONTROL),
        ],
        content,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use std::path::Path as FsPath;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    fn write_guide(root: &FsPath, slug: &str, text: &str) {
        let dir = root.join(slug);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page.mdx"), text).unwrap();
    }

    fn corpus() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write_guide(
            tmp.path(),
            "getting-started",
            "---\ntitle: Getting Started\ndescription: First steps\ntags: [intro]\n---\n\
             ## Install\nRun the installer.\n## Configure\nEdit settings.toml.\n",
        );
        write_guide(
            tmp.path(),
            "deploy",
            "---\ntitle: Deploy\ntags: [ops, intro]\n---\n## Ship\nPush to production.\n",
        );
        write_guide(
            tmp.path(),
            "draft",
            "---\ntitle: Draft\npublished: false\n---\n## Secret\nNot yet.\n",
        );
        tmp
    }

    fn app_with(root: &FsPath, vars: &[(&str, &str)]) -> Router {
        let root = root.display().to_string();
        let config = Config::from_lookup(|key| {
            if key == "GUIDES_CONTENT_DIR" {
                return Some(root.clone());
            }
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap();
        router(Arc::new(AppState::new(config).unwrap()))
    }

    fn app(root: &FsPath) -> Router {
        app_with(root, &[])
    }

    async fn send(app: Router, method: &str, uri: &str) -> Response {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(req).await.unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(resp).await).unwrap()
    }

    #[tokio::test]
    async fn health() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[tokio::test]
    async fn lists_published_guides() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/api/guides").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let slugs: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["slug"].as_str().unwrap())
            .collect();
        assert_eq!(slugs, vec!["deploy", "getting-started"]);
        assert_eq!(json[1]["metadata"]["title"], "Getting Started");
    }

    #[tokio::test]
    async fn filters_by_tags() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/api/guides?tags=ops,missing").await;
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["slug"], "deploy");
    }

    #[tokio::test]
    async fn tag_catalog() {
        let tmp = corpus();
        let json = body_json(send(app(tmp.path()), "GET", "/api/guides/tags").await).await;
        assert_eq!(json, serde_json::json!(["intro", "ops"]));
    }

    #[tokio::test]
    async fn search_without_query_is_empty() {
        let tmp = corpus();
        for uri in ["/api/guides/search", "/api/guides/search?q=", "/api/guides/search?q=%20%20"] {
            let resp = send(app(tmp.path()), "GET", uri).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_json(resp).await, serde_json::json!([]));
        }
    }

    #[tokio::test]
    async fn search_tolerates_bad_limit() {
        let tmp = corpus();
        let app = app(tmp.path());

        let resp = send(app.clone(), "GET", "/api/guides/search?limit=abc").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!([]));

        let resp = send(app, "GET", "/api/guides/search?q=settings&limit=abc").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_builds_index_lazily() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/api/guides/search?q=settings").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["slug"], "getting-started");
        assert_eq!(json[0]["stepId"], "configure");
        assert_eq!(json[0]["stepTitle"], "Configure");
        assert_eq!(json[0]["score"], 1.0);
    }

    #[tokio::test]
    async fn search_respects_limit_and_hides_drafts() {
        let tmp = corpus();
        let app = app(tmp.path());
        let json = body_json(send(app.clone(), "GET", "/api/guides/search?q=e&limit=1").await).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        let json = body_json(send(app, "GET", "/api/guides/search?q=secret").await).await;
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn get_guide_by_slug() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/api/guides/getting-started").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["slug"], "getting-started");
        assert_eq!(json["steps"].as_array().unwrap().len(), 2);
        assert_eq!(json["steps"][0]["id"], "install");
        assert!(json["rawContent"].as_str().unwrap().starts_with("## Install"));
    }

    #[tokio::test]
    async fn draft_loadable_by_slug() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/api/guides/draft").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["metadata"]["published"], false);
    }

    #[tokio::test]
    async fn unknown_slug_is_404() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/api/guides/nope").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("nope"));

        let resp = send(app(tmp.path()), "GET", "/api/guides/nope/raw").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn raw_markdown() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/api/guides/deploy/raw").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/markdown; charset=utf-8"
        );
        assert_eq!(body_text(resp).await, "## Ship\nPush to production.\n");
    }

    #[tokio::test]
    async fn reindex_reports_update() {
        let tmp = corpus();
        let app = app(tmp.path());

        let json = body_json(send(app.clone(), "POST", "/api/guides/reindex").await).await;
        assert_eq!(json["updated"], true);
        assert_eq!(json["documentCount"], 5);
        assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);

        let json = body_json(send(app.clone(), "POST", "/api/guides/reindex").await).await;
        assert_eq!(json["updated"], false);

        write_guide(tmp.path(), "new", "---\ntitle: Fresh Guide\n---\n");
        let json = body_json(send(app.clone(), "POST", "/api/guides/reindex").await).await;
        assert_eq!(json["updated"], true);
        assert_eq!(json["documentCount"], 6);

        let json = body_json(send(app, "GET", "/api/guides/search?q=fresh").await).await;
        assert_eq!(json[0]["slug"], "new");
    }

    #[tokio::test]
    async fn llms_txt_served() {
        let tmp = corpus();
        let resp = send(app(tmp.path()), "GET", "/llms.txt").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(resp.headers()[header::CACHE_CONTROL], LLMS_TXT_CACHE_CONTROL);
        let text = body_text(resp).await;
        assert!(text.starts_with("# mdguide\n"));
        assert!(text.contains("- [Getting Started](#getting-started)"));
        assert!(text.contains("Total Guides: 2"));
        assert!(!text.contains("Draft"));
    }

    #[tokio::test]
    async fn llms_txt_disabled() {
        let tmp = corpus();
        let app = app_with(tmp.path(), &[("GUIDES_LLMS_TXT_ENABLED", "false")]);
        let resp = send(app, "GET", "/llms.txt").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, "llms.txt is disabled");
    }
}
