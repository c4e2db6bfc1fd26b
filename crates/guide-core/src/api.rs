use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{GuideListItem, SearchResult};
use crate::search::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use crate::update::UpdateResult;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchGuidesParams {
    /// Free-text query; every word must match a word prefix in a guide or step.
    pub query: String,
    /// Maximum number of results to return (default: 10, max: 50).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetGuideParams {
    /// Guide slug, i.e. its directory name such as "getting-started".
    pub slug: String,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListGuidesParams {
    /// Only list guides carrying this tag.
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchGuidesResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GuideListResponse {
    pub guides: Vec<GuideListItem>,
    /// Every tag across published guides, regardless of the filter.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LlmsTxtResponse {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIndexResponse {
    pub updated: bool,
    pub fingerprint: String,
    pub document_count: u64,
}

impl From<UpdateResult> for UpdateIndexResponse {
    fn from(result: UpdateResult) -> Self {
        Self {
            updated: result.updated,
            fingerprint: result.fingerprint,
            document_count: result.document_count,
        }
    }
}

/// Requested result count, defaulted and capped.
pub fn effective_limit(limit: Option<u32>) -> usize {
    limit
        .map(|l| l as usize)
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .min(MAX_SEARCH_LIMIT)
}
