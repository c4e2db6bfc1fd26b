/// Update service for the guide search index.
///
/// Fingerprints the content directory and rebuilds the index when the
/// fingerprint changes or the index has never been built. Runs lazily on the
/// first search and on demand via the reindex endpoint / `update_index` tool.
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::GuideError;
use crate::loader::GuideLoader;
use crate::search::SearchIndex;

/// Result of an update operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    /// Whether the index was rebuilt (false if already up to date).
    pub updated: bool,
    /// Content fingerprint the index now reflects.
    pub fingerprint: String,
    /// Documents in the index after the update.
    pub document_count: u64,
}

pub struct UpdateService {
    loader: GuideLoader,
    index: Arc<SearchIndex>,
    /// Fingerprint of the last successful build. Held across an update so
    /// concurrent updates run one at a time.
    indexed_fingerprint: Mutex<Option<String>>,
}

impl UpdateService {
    pub fn new(loader: GuideLoader, index: Arc<SearchIndex>) -> Self {
        Self {
            loader,
            index,
            indexed_fingerprint: Mutex::new(None),
        }
    }

    pub fn index(&self) -> &Arc<SearchIndex> {
        &self.index
    }

    async fn current_fingerprint(&self) -> Result<String, GuideError> {
        let loader = self.loader.clone();
        tokio::task::spawn_blocking(move || loader.fingerprint())
            .await
            .map_err(|e| GuideError::Task(e.to_string()))
    }

    /// Check if the index is missing or stale.
    pub async fn needs_update(&self) -> Result<bool, GuideError> {
        let current = self.current_fingerprint().await?;
        let indexed = self.indexed_fingerprint.lock().await;
        Ok(!self.index.is_built() || indexed.as_deref() != Some(current.as_str()))
    }

    /// Rebuild the index if the content changed since the last build.
    pub async fn update(&self) -> Result<UpdateResult, GuideError> {
        let mut indexed = self.indexed_fingerprint.lock().await;
        let current = self.current_fingerprint().await?;

        if self.index.is_built() && indexed.as_deref() == Some(current.as_str()) {
            debug!(fingerprint = %current, "search index up to date");
            return Ok(UpdateResult {
                updated: false,
                fingerprint: current,
                document_count: self.index.document_count(),
            });
        }

        let document_count = self.full_reindex().await?;
        info!(fingerprint = %current, document_count, "search index refreshed");
        *indexed = Some(current.clone());

        Ok(UpdateResult {
            updated: true,
            fingerprint: current,
            document_count,
        })
    }

    /// Build the index unless it already is. Used before serving a search.
    pub async fn ensure_index(&self) -> Result<(), GuideError> {
        if self.index.is_built() {
            return Ok(());
        }
        self.update().await.map(|_| ())
    }

    /// Reset and rebuild the index from every published guide.
    pub async fn full_reindex(&self) -> Result<u64, GuideError> {
        let loader = self.loader.clone();
        let index = Arc::clone(&self.index);

        tokio::task::spawn_blocking(move || {
            let guides = loader.load_all_published_with_content();
            info!(guides = guides.len(), "re-indexing published guides");
            index.reset();
            index.build(&guides);
            if index.is_built() {
                Ok(index.document_count())
            } else {
                Err(GuideError::IndexBuild)
            }
        })
        .await
        .map_err(|e| GuideError::Task(e.to_string()))?
    }
}
