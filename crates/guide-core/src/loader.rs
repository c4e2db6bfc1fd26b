/// Filesystem-backed guide repository.
///
/// Layout: `<content_dir>/<slug>/<content_file>`, one directory per guide.
/// Every call re-reads and re-parses the files; nothing is cached here.
/// All operations are read-only and degrade to empty/`None` on failure.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::model::{Guide, GuideListItem};
use crate::parser;

#[derive(Debug, Clone)]
pub struct GuideLoader {
    content_dir: PathBuf,
    content_file: String,
}

impl GuideLoader {
    pub fn new(content_dir: impl Into<PathBuf>, content_file: impl Into<String>) -> Self {
        Self {
            content_dir: content_dir.into(),
            content_file: content_file.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.content_dir.clone(), config.content_file.clone())
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Names of the guide directories, sorted. Empty if the root is missing.
    pub fn list_slugs(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.content_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(
                    content_dir = %self.content_dir.display(),
                    error = %e,
                    "content directory not readable, no guides"
                );
                return Vec::new();
            }
        };

        let mut slugs: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        slugs.sort();
        slugs
    }

    /// Path of the content file for `slug`, or `None` if the slug could escape
    /// the content root.
    fn guide_path(&self, slug: &str) -> Option<PathBuf> {
        let valid = !slug.is_empty()
            && slug != "."
            && slug != ".."
            && !slug.contains(['/', '\\', '\0']);
        valid.then(|| self.content_dir.join(slug).join(&self.content_file))
    }

    fn read_source(&self, slug: &str) -> std::io::Result<String> {
        let path = self.guide_path(slug).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid guide slug")
        })?;
        std::fs::read_to_string(path)
    }

    /// Load and parse a single guide. Unpublished guides are returned too.
    pub fn load_by_slug(&self, slug: &str) -> Option<Guide> {
        match self.read_source(slug) {
            Ok(text) => Some(parser::parse_guide(&text, slug)),
            Err(e) => {
                error!(slug, error = %e, "failed to load guide");
                None
            }
        }
    }

    /// Metadata of every published guide, in slug order.
    pub fn list_published(&self) -> Vec<GuideListItem> {
        let mut items = Vec::new();
        for slug in self.list_slugs() {
            match self.read_source(&slug) {
                Ok(text) => {
                    let item = parser::parse_metadata(&text, &slug);
                    if item.metadata.published {
                        items.push(item);
                    }
                }
                Err(e) => {
                    warn!(slug, error = %e, "failed to load guide metadata, skipping");
                }
            }
        }
        items
    }

    /// Fully parsed published guides, for indexing and export.
    pub fn load_all_published_with_content(&self) -> Vec<Guide> {
        self.list_slugs()
            .iter()
            .filter_map(|slug| self.load_by_slug(slug))
            .filter(|guide| guide.metadata.published)
            .collect()
    }

    /// SHA-256 over every slug and its content file, in slug order.
    ///
    /// Unreadable files contribute only their slug, so a guide that becomes
    /// readable again still changes the fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for slug in self.list_slugs() {
            hasher.update(slug.as_bytes());
            hasher.update(b"\0");
            if let Some(path) = self.guide_path(&slug) {
                if let Ok(bytes) = std::fs::read(path) {
                    hasher.update((bytes.len() as u64).to_le_bytes());
                    hasher.update(&bytes);
                }
            }
            hasher.update(b"\0");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Unique tags across `items`, sorted.
pub fn all_tags(items: &[GuideListItem]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.metadata.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Keep guides carrying any of `tags`; an empty selection keeps everything.
pub fn filter_by_tags(items: Vec<GuideListItem>, tags: &[String]) -> Vec<GuideListItem> {
    if tags.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| item.metadata.tags.iter().any(|t| tags.contains(t)))
        .collect()
}
