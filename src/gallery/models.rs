use serde::{Deserialize, Serialize};

/// One indexed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryAsset {
    /// Bucket the asset belongs to, e.g. `drone_photos`.
    pub album: String,
    pub filename: String,
    pub url: String,
    pub title: String,
    pub project_id: String,
    /// Unix millis.
    pub created_at: i64,
}

impl GalleryAsset {
    pub fn new(
        album: impl Into<String>,
        filename: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            album: album.into(),
            filename: filename.into(),
            url: url.into(),
            title: title.into(),
            project_id: project_id.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
