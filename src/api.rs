//! Remote gateway for the cataas.com REST API
//!
//! Translates typed requests into HTTP calls, decodes the JSON bodies and
//! maps every failure into [`ApiError`]. Nothing here retries or
//! de-duplicates; callers decide both.

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{normalize_tags, ImageRecord};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::de::DeserializeOwned;

/// Port onto the remote image API.
#[async_trait]
pub trait CatApi: Send + Sync {
    /// One page of image records for the given tag filter (empty = all).
    async fn fetch_page(
        &self,
        tags: &[String],
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ImageRecord>, ApiError>;

    /// Full tag vocabulary, normalized (no empties, unique, sorted).
    async fn fetch_tags(&self) -> Result<Vec<String>, ApiError>;

    /// Metadata for a single image.
    async fn fetch_single(&self, id: &str) -> Result<ImageRecord, ApiError>;

    /// Raw bytes of one random image.
    async fn fetch_random_image_bytes(&self) -> Result<Vec<u8>, ApiError>;
}

/// reqwest-backed [`CatApi`] talking to a fixed host.
#[derive(Clone)]
pub struct CatService {
    client: reqwest::Client,
    base_url: Url,
}

impl CatService {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("cats-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ApiError::InvalidRequest(format!("{} cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// `/api/cats?skip=..&limit=..[&tags=a,b]`
    pub fn page_url(&self, tags: &[String], skip: u32, limit: u32) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["api", "cats"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("skip", &skip.to_string());
            query.append_pair("limit", &limit.to_string());
            if !tags.is_empty() {
                query.append_pair("tags", &tags.join(","));
            }
        }
        Ok(url)
    }

    pub fn tags_url(&self) -> Result<Url, ApiError> {
        self.endpoint(&["api", "tags"])
    }

    pub fn single_url(&self, id: &str) -> Result<Url, ApiError> {
        if id.is_empty() {
            return Err(ApiError::InvalidRequest("empty image id".to_string()));
        }
        self.endpoint(&["cat", id])
    }

    pub fn random_url(&self) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["cat"])?;
        url.query_pairs_mut().append_pair("position", "center");
        Ok(url)
    }

    async fn get(&self, url: Url, accept: &str) -> Result<reqwest::Response, ApiError> {
        debug!("[api] GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("[api] {} returned status {}", url.path(), status);
            return Err(ApiError::InvalidResponse(format!(
                "{} returned status {}",
                url.path(),
                status
            )));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let bytes = self
            .get(url, "application/json")
            .await?
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ApiError::InvalidResponse("empty body".to_string()));
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decoding(e.to_string()))
    }
}

/// Rejects records without an id and caps the batch at `limit`.
fn validate_page(mut records: Vec<ImageRecord>, limit: u32) -> Result<Vec<ImageRecord>, ApiError> {
    if records.iter().any(|r| r.id.is_empty()) {
        return Err(ApiError::Decoding("image record with empty _id".to_string()));
    }
    if records.len() > limit as usize {
        warn!(
            "[api] server returned {} records for limit {}, truncating",
            records.len(),
            limit
        );
        records.truncate(limit as usize);
    }
    Ok(records)
}

#[async_trait]
impl CatApi for CatService {
    async fn fetch_page(
        &self,
        tags: &[String],
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ImageRecord>, ApiError> {
        if limit == 0 {
            return Err(ApiError::InvalidRequest("limit must be positive".to_string()));
        }
        let url = self.page_url(tags, skip, limit)?;
        let records: Vec<ImageRecord> = self.get_json(url).await?;
        validate_page(records, limit)
    }

    async fn fetch_tags(&self) -> Result<Vec<String>, ApiError> {
        let url = self.tags_url()?;
        let tags: Vec<String> = self.get_json(url).await?;
        Ok(normalize_tags(tags))
    }

    async fn fetch_single(&self, id: &str) -> Result<ImageRecord, ApiError> {
        let url = self.single_url(id)?;
        let record: ImageRecord = self.get_json(url).await?;
        if record.id.is_empty() {
            return Err(ApiError::Decoding("image record with empty _id".to_string()));
        }
        Ok(record)
    }

    async fn fetch_random_image_bytes(&self) -> Result<Vec<u8>, ApiError> {
        let url = self.random_url()?;
        let response = self.get(url, "image/*").await?;

        let mut stream = response.bytes_stream();
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ApiError::Transport(format!("Stream error: {}", e)))?;
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(ApiError::InvalidResponse("empty body".to_string()));
        }
        Ok(data)
    }
}
