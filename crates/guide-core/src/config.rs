use std::path::{Path, PathBuf};

use crate::error::GuideError;

pub const DEFAULT_CONTENT_FILE: &str = "page.mdx";
pub const DEFAULT_SITE_TITLE: &str = "mdguide";
pub const DEFAULT_SITE_DESCRIPTION: &str = "A modern documentation and guide platform with step-by-step guides, full-text search, and progress tracking.";

/// Site-level metadata shown in exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMetadata {
    pub title: String,
    pub description: String,
}

impl Default for SiteMetadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_SITE_TITLE.to_string(),
            description: DEFAULT_SITE_DESCRIPTION.to_string(),
        }
    }
}

/// Options for the `llms.txt` export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmsTxtConfig {
    pub enabled: bool,
    pub include_step_content: bool,
}

impl Default for LlmsTxtConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_step_content: false,
        }
    }
}

/// Application configuration loaded explicitly from environment variables.
///
/// The content root is required. A root that does not exist yet is accepted
/// and behaves as an empty corpus.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one subdirectory per guide.
    pub content_dir: PathBuf,
    /// File name of the guide source inside each guide directory.
    pub content_file: String,
    pub site: SiteMetadata,
    pub llms_txt: LlmsTxtConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `GUIDES_CONTENT_DIR`: directory with one subdirectory per guide
    ///
    /// Optional:
    /// - `GUIDES_CONTENT_FILE` (default: "page.mdx")
    /// - `GUIDES_SITE_TITLE`, `GUIDES_SITE_DESCRIPTION`
    /// - `GUIDES_LLMS_TXT_ENABLED` (default: true)
    /// - `GUIDES_LLMS_TXT_INCLUDE_STEP_CONTENT` (default: false)
    pub fn from_env() -> Result<Self, GuideError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GuideError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content_dir = lookup("GUIDES_CONTENT_DIR")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                GuideError::Config("GUIDES_CONTENT_DIR environment variable is required".to_string())
            })?;

        let content_file = lookup("GUIDES_CONTENT_FILE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_FILE.to_string());
        if content_file.contains(['/', '\\']) {
            return Err(GuideError::Config(format!(
                "GUIDES_CONTENT_FILE must be a plain file name, got {content_file:?}"
            )));
        }

        let defaults = SiteMetadata::default();
        let site = SiteMetadata {
            title: lookup("GUIDES_SITE_TITLE").unwrap_or(defaults.title),
            description: lookup("GUIDES_SITE_DESCRIPTION").unwrap_or(defaults.description),
        };

        let llms_defaults = LlmsTxtConfig::default();
        let llms_txt = LlmsTxtConfig {
            enabled: parse_flag(&lookup, "GUIDES_LLMS_TXT_ENABLED")?
                .unwrap_or(llms_defaults.enabled),
            include_step_content: parse_flag(&lookup, "GUIDES_LLMS_TXT_INCLUDE_STEP_CONTENT")?
                .unwrap_or(llms_defaults.include_step_content),
        };

        Ok(Self {
            content_dir: PathBuf::from(content_dir),
            content_file,
            site,
            llms_txt,
        })
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>, GuideError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(GuideError::Config(format!(
            "{key} must be a boolean (true/false), got {other:?}"
        ))),
    }
}
