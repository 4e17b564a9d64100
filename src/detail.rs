//! Detail screen state: one image, refreshed metadata and related images per tag

use crate::api::CatApi;
use crate::error::ApiError;
use crate::models::ImageRecord;
use log::{error, info};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Related images shown per tag
pub const DEFAULT_RELATED_LIMIT: usize = 4;

#[derive(Debug, Clone)]
pub struct DetailState {
    pub record: ImageRecord,
    pub related: BTreeMap<String, Vec<ImageRecord>>,
    pub error_message: Option<String>,
}

pub struct DetailController {
    api: Arc<dyn CatApi>,
    related_limit: usize,
    state: Mutex<DetailState>,
}

impl DetailController {
    pub fn new(api: Arc<dyn CatApi>, record: ImageRecord) -> Self {
        Self::with_related_limit(api, record, DEFAULT_RELATED_LIMIT)
    }

    pub fn with_related_limit(api: Arc<dyn CatApi>, record: ImageRecord, related_limit: usize) -> Self {
        Self {
            api,
            related_limit,
            state: Mutex::new(DetailState {
                record,
                related: BTreeMap::new(),
                error_message: None,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DetailState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> DetailState {
        self.lock_state().clone()
    }

    pub fn dismiss_error(&self) {
        self.lock_state().error_message = None;
    }

    /// Re-fetches the record's metadata and replaces the held copy.
    pub async fn refresh(&self) -> Result<ImageRecord, ApiError> {
        let id = self.lock_state().record.id.clone();
        match self.api.fetch_single(&id).await {
            Ok(record) => {
                let mut state = self.lock_state();
                // The record may have been swapped meanwhile; only refresh the same entity
                if state.record.id == record.id {
                    state.record = record.clone();
                }
                Ok(record)
            }
            Err(e) => {
                error!("[detail] failed to refresh {}: {}", id, e);
                self.lock_state().error_message =
                    Some(format!("Error fetching cat details: {}", e));
                Err(e)
            }
        }
    }

    /// Loads a handful of other images sharing `tag`, excluding this one.
    pub async fn load_related(&self, tag: &str) -> Result<Vec<ImageRecord>, ApiError> {
        let id = self.lock_state().record.id.clone();
        // One extra in case the page contains this very image
        let limit = u32::try_from(self.related_limit)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        let tags = vec![tag.to_string()];

        match self.api.fetch_page(&tags, 0, limit).await {
            Ok(page) => {
                let mut related: Vec<ImageRecord> = Vec::new();
                for record in page {
                    if record.id != id && !related.contains(&record) {
                        related.push(record);
                    }
                }
                related.truncate(self.related_limit);
                info!("[detail] {} related images for tag {}", related.len(), tag);
                self.lock_state()
                    .related
                    .insert(tag.to_string(), related.clone());
                Ok(related)
            }
            Err(e) => {
                error!("[detail] failed to load tag {}: {}", tag, e);
                self.lock_state().error_message =
                    Some(format!("Error loading cats for tag {}: {}", tag, e));
                Err(e)
            }
        }
    }

    /// Related images for every tag of the record, sequentially.
    pub async fn load_all_related(&self) -> Vec<(String, Result<Vec<ImageRecord>, ApiError>)> {
        let tags = self.lock_state().record.tags.clone();
        let mut seen = std::collections::HashSet::new();
        let mut results = Vec::new();
        for tag in tags.into_iter().filter(|t| !t.is_empty()) {
            if seen.insert(tag.clone()) {
                let result = self.load_related(&tag).await;
                results.push((tag, result));
            }
        }
        results
    }
}
