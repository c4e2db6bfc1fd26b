/// Error types for the guide core.
///
/// These cover configuration, index and task failures. The public guide
/// operations (loading, listing, searching) log these and degrade to empty or
/// absent results; only constructors and the update cycle hand them to callers.
#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("config error: {0}")]
    Config(String),

    #[error("search index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("search index build failed, see logs")]
    IndexBuild,

    #[error("background task failed: {0}")]
    Task(String),
}
