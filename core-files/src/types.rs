use bridge_traits::provider::ProviderFile;
use bridge_traits::stores::CachedFileEntry;
use serde::{Deserialize, Serialize};

/// One file as presented to the client. Derived per request, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub key: String,
    pub name: String,
    /// Absent thumbnails are represented as `None`, never as an error.
    pub thumbnail_url: Option<String>,
    pub last_modified: String,
    pub editor_type: String,
    pub is_bookmarked: bool,
}

impl FileSummary {
    /// Build from live provider metadata, keeping the locally owned
    /// bookmark flag.
    pub fn from_provider(file: ProviderFile, is_bookmarked: bool) -> Self {
        Self {
            key: file.key,
            name: file.name,
            thumbnail_url: file.thumbnail_url,
            last_modified: file.last_modified,
            editor_type: file.editor_type,
            is_bookmarked,
        }
    }

    /// Build from the last cached values when the live lookup failed.
    pub fn from_cache(entry: &CachedFileEntry) -> Self {
        Self {
            key: entry.file_key.clone(),
            name: entry.title.clone(),
            thumbnail_url: entry.thumbnail_url.clone(),
            last_modified: entry.last_accessed_at.to_rfc3339(),
            editor_type: entry.file_type.clone(),
            is_bookmarked: entry.is_bookmarked,
        }
    }
}

/// Listing result: the files plus an optional empty-state message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub files: Vec<FileSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
