//! Scripted in-memory `CatApi` for controller tests

use crate::api::CatApi;
use crate::error::ApiError;
use crate::models::{record, ImageRecord};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Records with the given ids, in order.
pub(crate) fn page(ids: &[&str]) -> Vec<ImageRecord> {
    ids.iter().map(|id| record(id)).collect()
}

/// `count` records named `{prefix}{n}`.
pub(crate) fn numbered(prefix: &str, count: usize) -> Vec<ImageRecord> {
    (0..count).map(|n| record(&format!("{}{}", prefix, n))).collect()
}

struct ScriptedPage {
    result: Result<Vec<ImageRecord>, ApiError>,
    gate: Option<Arc<Notify>>,
}

#[derive(Default)]
pub(crate) struct FakeCatApi {
    pages: Mutex<VecDeque<ScriptedPage>>,
    tags: Mutex<VecDeque<Result<Vec<String>, ApiError>>>,
    singles: Mutex<HashMap<String, ImageRecord>>,
    random: Mutex<Option<Vec<u8>>>,
    page_calls: Mutex<Vec<(Vec<String>, u32, u32)>>,
    tag_calls: AtomicUsize,
    random_calls: AtomicUsize,
}

impl FakeCatApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_page(&self, records: Vec<ImageRecord>) {
        self.push(Ok(records), None);
    }

    pub(crate) fn push_page_error(&self, error: ApiError) {
        self.push(Err(error), None);
    }

    /// Queues a page that is only delivered once the returned gate is notified.
    pub(crate) fn push_gated_page(&self, records: Vec<ImageRecord>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push(Ok(records), Some(Arc::clone(&gate)));
        gate
    }

    fn push(&self, result: Result<Vec<ImageRecord>, ApiError>, gate: Option<Arc<Notify>>) {
        self.pages
            .lock()
            .unwrap()
            .push_back(ScriptedPage { result, gate });
    }

    pub(crate) fn push_tags(&self, result: Result<Vec<String>, ApiError>) {
        self.tags.lock().unwrap().push_back(result);
    }

    pub(crate) fn put_single(&self, record: ImageRecord) {
        self.singles.lock().unwrap().insert(record.id.clone(), record);
    }

    pub(crate) fn set_random(&self, bytes: Vec<u8>) {
        *self.random.lock().unwrap() = Some(bytes);
    }

    pub(crate) fn page_calls(&self) -> Vec<(Vec<String>, u32, u32)> {
        self.page_calls.lock().unwrap().clone()
    }

    pub(crate) fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn random_calls(&self) -> usize {
        self.random_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatApi for FakeCatApi {
    async fn fetch_page(
        &self,
        tags: &[String],
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ImageRecord>, ApiError> {
        self.page_calls
            .lock()
            .unwrap()
            .push((tags.to_vec(), skip, limit));
        let scripted = self.pages.lock().unwrap().pop_front();
        match scripted {
            Some(ScriptedPage { result, gate }) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                result
            }
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_tags(&self) -> Result<Vec<String>, ApiError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        self.tags
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_single(&self, id: &str) -> Result<ImageRecord, ApiError> {
        self.singles
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::InvalidResponse(format!("/cat/{} returned status 404", id)))
    }

    async fn fetch_random_image_bytes(&self) -> Result<Vec<u8>, ApiError> {
        self.random_calls.fetch_add(1, Ordering::SeqCst);
        self.random
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Transport("offline".to_string()))
    }
}
