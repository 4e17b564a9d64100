//! Data models and structures used throughout the application

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Public host serving image metadata and image bytes
pub const CATAAS_BASE_URL: &str = "https://cataas.com";

/// One remote cat image, as returned by `/api/cats`.
///
/// Two records are the same entity iff their `id` matches; other fields
/// (e.g. `edited_at`) may differ between fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub size: Option<f64>,
    pub tags: Vec<String>,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "editedAt", default)]
    pub edited_at: Option<DateTime<Utc>>,
}

impl PartialEq for ImageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImageRecord {}

impl Hash for ImageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl ImageRecord {
    /// Canonical image URL on the public host, with optional size hints.
    pub fn image_url(&self, width: Option<u32>, height: Option<u32>) -> Result<Url, ApiError> {
        self.image_url_on(CATAAS_BASE_URL, width, height)
    }

    /// Image URL against an arbitrary host (e.g. a configured mirror).
    pub fn image_url_on(
        &self,
        base: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Url, ApiError> {
        let mut url = Url::parse(base)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid base URL {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("{} cannot carry a path", base)))?
            .pop_if_empty()
            .extend(["cat", self.id.as_str()]);

        if width.is_some() || height.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(w) = width {
                query.append_pair("width", &w.to_string());
            }
            if let Some(h) = height {
                query.append_pair("height", &h.to_string());
            }
        }
        Ok(url)
    }

    /// File extension matching the record's MIME type, `bin` when unknown.
    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Maps a MIME type such as `image/gif` to a preferred file extension.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        _ => mime_guess::get_mime_extensions_str(mime_type)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

/// Cached tag vocabulary with the moment it was last refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub tags: Vec<String>,
    pub last_refreshed: DateTime<Utc>,
}

/// Drops empty tags, deduplicates and sorts ascending (case-sensitive).
pub fn normalize_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    tags.into_iter()
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
pub(crate) fn record(id: &str) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        size: Some(1.0),
        tags: vec!["cute".to_string()],
        mime_type: "image/jpeg".to_string(),
        created_at: None,
        edited_at: None,
    }
}
