use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Title used when a guide's frontmatter has no usable `title`.
pub const UNTITLED_GUIDE: &str = "Untitled Guide";

/// Steps are delimited by second-level headings only.
pub const STEP_HEADING_LEVEL: u8 = 2;

/// Frontmatter-derived metadata of a guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuideMetadata {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// `YYYY-MM-DD` when the header carried a date or timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published: bool,
}

impl Default for GuideMetadata {
    fn default() -> Self {
        Self {
            title: UNTITLED_GUIDE.to_string(),
            description: String::new(),
            author: None,
            date: None,
            tags: Vec::new(),
            published: true,
        }
    }
}

/// A `##`-delimited section of a guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    /// Slug of the heading text; not unique if headings repeat.
    pub id: String,
    /// Heading text, verbatim.
    pub title: String,
    /// Lines between this heading and the next one, trimmed.
    pub content: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    /// Directory name of the guide under the content root.
    pub slug: String,
    pub metadata: GuideMetadata,
    pub steps: Vec<Step>,
    /// Markdown body after the frontmatter.
    pub raw_content: String,
}

/// Listing projection of a guide: no steps, no body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GuideListItem {
    pub slug: String,
    pub metadata: GuideMetadata,
}

impl From<&Guide> for GuideListItem {
    fn from(guide: &Guide) -> Self {
        Self {
            slug: guide.slug.clone(),
            metadata: guide.metadata.clone(),
        }
    }
}

/// A guide- or step-level search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub slug: String,
    /// Title of the guide, also for step hits.
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_title: Option<String>,
    /// Always [`crate::search::PLACEHOLDER_SCORE`]; the index does not expose a
    /// relevance value.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_defaults() {
        let meta = GuideMetadata::default();
        assert_eq!(meta.title, "Untitled Guide");
        assert!(meta.description.is_empty());
        assert!(meta.published);
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn guide_serializes_camel_case() {
        let guide = Guide {
            slug: "intro".to_string(),
            metadata: GuideMetadata::default(),
            steps: Vec::new(),
            raw_content: "body".to_string(),
        };
        let json = serde_json::to_value(&guide).unwrap();
        assert_eq!(json["rawContent"], "body");
        assert!(json["metadata"].get("author").is_none());
    }

    #[test]
    fn search_result_omits_missing_step() {
        let result = SearchResult {
            slug: "intro".to_string(),
            title: "Intro".to_string(),
            description: String::new(),
            step_id: None,
            step_title: None,
            score: 1.0,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("stepId"));

        let step_hit = SearchResult {
            step_id: Some("setup".to_string()),
            step_title: Some("Setup".to_string()),
            ..result
        };
        let json = serde_json::to_value(&step_hit).unwrap();
        assert_eq!(json["stepId"], "setup");
        assert_eq!(json["stepTitle"], "Setup");
    }
}
