//! Feed controller: paginated, tag-filtered loading of image records
//!
//! All state lives in [`FeedState`] behind a mutex that is never held
//! across an `.await`. A filter change bumps a generation counter so a page
//! that was requested under the old filter is dropped when it resolves.

use crate::api::CatApi;
use crate::error::ApiError;
use crate::models::{normalize_tags, ImageRecord};
use crate::tags::TagCache;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Page size used when none is configured
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Everything the presentation layer renders for the feed.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub items: Vec<ImageRecord>,
    pub selected_tags: BTreeSet<String>,
    /// Server-side position of the next page
    pub offset: u32,
    pub exhausted: bool,
    pub loading: bool,
    pub all_tags: Vec<String>,
    pub loading_tags: bool,
    /// Dismissible alert text
    pub error_message: Option<String>,
    pub first_load_finished: bool,
    generation: u64,
}

/// Result of a page request.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Loaded { received: usize, appended: usize },
    /// Another page fetch was already in flight
    AlreadyLoading,
    /// No more pages for the current filter
    Exhausted,
    /// The filter changed while the page was in flight
    Discarded,
    /// The filter was set to its current value
    FilterUnchanged,
    Failed(ApiError),
}

/// Result of [`FeedController::load_tags`].
#[derive(Debug, Clone, PartialEq)]
pub enum TagsOutcome {
    Cached(Vec<String>),
    Refreshed(Vec<String>),
    /// Refresh failed; `stale` is what remains on screen
    Failed { error: ApiError, stale: Vec<String> },
}

pub struct FeedController {
    api: Arc<dyn CatApi>,
    tag_cache: TagCache,
    page_size: u32,
    state: Mutex<FeedState>,
}

impl FeedController {
    pub fn new(api: Arc<dyn CatApi>, tag_cache: TagCache) -> Self {
        Self::with_page_size(api, tag_cache, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(api: Arc<dyn CatApi>, tag_cache: TagCache, page_size: u32) -> Self {
        Self {
            api,
            tag_cache,
            page_size: page_size.max(1),
            state: Mutex::new(FeedState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> FeedState {
        self.lock_state().clone()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn dismiss_error(&self) {
        self.lock_state().error_message = None;
    }

    /// Fetches the next page, or the first one when `replace` is set.
    pub async fn request_page(&self, replace: bool) -> PageOutcome {
        let (tags, skip, generation) = {
            let mut state = self.lock_state();
            if state.loading {
                debug!("[feed] page already in flight, ignoring request");
                return PageOutcome::AlreadyLoading;
            }
            if !replace && state.exhausted {
                return PageOutcome::Exhausted;
            }
            state.loading = true;
            let skip = if replace { 0 } else { state.offset };
            let tags: Vec<String> = state.selected_tags.iter().cloned().collect();
            (tags, skip, state.generation)
        };

        debug!("[feed] fetching skip={} limit={} tags={:?}", skip, self.page_size, tags);
        let result = self.api.fetch_page(&tags, skip, self.page_size).await;

        let mut state = self.lock_state();
        if state.generation != generation {
            info!("[feed] filter changed during fetch, dropping page at skip={}", skip);
            return PageOutcome::Discarded;
        }
        state.loading = false;
        state.first_load_finished = true;

        match result {
            Ok(batch) => {
                let received = batch.len();
                if replace {
                    state.items.clear();
                }
                let mut seen: HashSet<String> = state.items.iter().map(|c| c.id.clone()).collect();
                let mut appended = 0;
                for record in batch {
                    if seen.insert(record.id.clone()) {
                        state.items.push(record);
                        appended += 1;
                    }
                }
                if appended < received {
                    warn!("[feed] dropped {} duplicate records", received - appended);
                }
                state.offset = skip + received as u32;
                state.exhausted = received < self.page_size as usize;
                info!(
                    "[feed] loaded {} records, offset={} exhausted={}",
                    appended, state.offset, state.exhausted
                );
                PageOutcome::Loaded { received, appended }
            }
            Err(e) => {
                error!("[feed] page fetch failed: {}", e);
                state.error_message = Some(format!("Error loading cats: {}", e));
                PageOutcome::Failed(e)
            }
        }
    }

    /// Replaces the tag filter and reloads from the first page.
    pub async fn set_selected_tags<I, S>(&self, tags: I) -> PageOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(Into::<String>::into)
            .filter(|t| !t.is_empty())
            .collect();
        {
            let mut state = self.lock_state();
            if state.selected_tags == tags {
                return PageOutcome::FilterUnchanged;
            }
            info!("[feed] filter changed to {:?}", tags);
            state.selected_tags = tags;
            state.generation += 1;
            state.items.clear();
            state.offset = 0;
            state.exhausted = false;
            state.loading = false;
        }
        self.request_page(true).await
    }

    /// Adds one tag to the filter (no-op if already selected).
    pub async fn add_selected_tag(&self, tag: &str) -> PageOutcome {
        let mut tags = self.lock_state().selected_tags.clone();
        tags.insert(tag.to_string());
        self.set_selected_tags(tags).await
    }

    pub async fn remove_selected_tag(&self, tag: &str) -> PageOutcome {
        let mut tags = self.lock_state().selected_tags.clone();
        tags.remove(tag);
        self.set_selected_tags(tags).await
    }

    /// Infinite-scroll hook: loads the next page once the last item shows up.
    pub async fn item_appeared(&self, id: &str) -> Option<PageOutcome> {
        let is_last = {
            let state = self.lock_state();
            state.items.last().map(|c| c.id == id).unwrap_or(false)
                && !state.exhausted
                && !state.loading
        };
        if is_last {
            Some(self.request_page(false).await)
        } else {
            None
        }
    }

    /// Serves tags from the cache while fresh, otherwise refreshes them.
    pub async fn load_tags(&self) -> TagsOutcome {
        let cached = match self.tag_cache.load() {
            Ok(cached) => cached,
            Err(e) => {
                warn!("[feed] tag cache unreadable, refetching: {}", e);
                None
            }
        };

        if let Some(snapshot) = &cached {
            if self.tag_cache.is_fresh(snapshot, Utc::now()) {
                let mut state = self.lock_state();
                state.all_tags = snapshot.tags.clone();
                state.loading_tags = false;
                return TagsOutcome::Cached(snapshot.tags.clone());
            }
        }

        {
            let mut state = self.lock_state();
            state.loading_tags = true;
            if let Some(snapshot) = cached {
                state.all_tags = snapshot.tags;
            }
        }

        let result = self.api.fetch_tags().await;
        match result {
            Ok(tags) => {
                let tags = normalize_tags(tags);
                if let Err(e) = self.tag_cache.store(tags.clone(), Utc::now()) {
                    warn!("[feed] failed to cache tags: {}", e);
                }
                let mut state = self.lock_state();
                state.all_tags = tags.clone();
                state.loading_tags = false;
                info!("[feed] refreshed {} tags", tags.len());
                TagsOutcome::Refreshed(tags)
            }
            Err(e) => {
                error!("[feed] tag fetch failed: {}", e);
                let mut state = self.lock_state();
                state.loading_tags = false;
                state.error_message = Some(format!("Error loading tags: {}", e));
                TagsOutcome::Failed {
                    error: e,
                    stale: state.all_tags.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::testing::{numbered, page, FakeCatApi};
    use chrono::Duration;

    fn controller(api: &Arc<FakeCatApi>) -> (FeedController, TagCache) {
        let cache = TagCache::new(Database::open_in_memory().unwrap());
        let api: Arc<dyn CatApi> = api.clone();
        (FeedController::new(api, cache.clone()), cache)
    }

    fn ids(state: &FeedState) -> Vec<&str> {
        state.items.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initial_state_is_idle_empty() {
        let api = FakeCatApi::new();
        let (feed, _) = controller(&api);
        let state = feed.snapshot();
        assert!(state.items.is_empty());
        assert!(!state.loading);
        assert!(!state.exhausted);
        assert_eq!(state.offset, 0);
    }

    #[tokio::test]
    async fn test_two_pages_until_exhausted() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 10));
        api.push_page(numbered("b", 4));
        let (feed, _) = controller(&api);

        let first = feed.request_page(false).await;
        assert_eq!(first, PageOutcome::Loaded { received: 10, appended: 10 });
        let state = feed.snapshot();
        assert_eq!(state.offset, 10);
        assert!(!state.exhausted);

        feed.request_page(false).await;
        let state = feed.snapshot();
        assert_eq!(state.offset, 14);
        assert!(state.exhausted);
        assert_eq!(state.items.len(), 14);
        assert_eq!(state.items[10].id, "b0");

        assert_eq!(
            api.page_calls(),
            vec![(Vec::new(), 0, 10), (Vec::new(), 10, 10)]
        );
    }

    #[tokio::test]
    async fn test_exhausted_feed_issues_no_more_calls() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 3));
        let (feed, _) = controller(&api);

        feed.request_page(false).await;
        assert!(feed.snapshot().exhausted);
        assert_eq!(feed.request_page(false).await, PageOutcome::Exhausted);
        assert_eq!(api.page_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_exhaustion_fetches_again() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 3));
        api.push_page(numbered("b", 10));
        let (feed, _) = controller(&api);

        feed.request_page(false).await;
        assert!(feed.snapshot().exhausted);

        let outcome = feed.request_page(true).await;
        assert_eq!(outcome, PageOutcome::Loaded { received: 10, appended: 10 });
        let calls = api.page_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, 0);

        let state = feed.snapshot();
        assert!(!state.exhausted);
        assert_eq!(state.offset, 10);
        assert_eq!(state.items[0].id, "b0");
        assert_eq!(state.items.len(), 10);
    }

    #[tokio::test]
    async fn test_duplicates_are_merged_once() {
        let api = FakeCatApi::new();
        api.push_page(page(&["a", "b", "a", "c", "d", "e", "f", "g", "h", "i"]));
        api.push_page(page(&["i", "j"]));
        let (feed, _) = controller(&api);

        let outcome = feed.request_page(false).await;
        assert_eq!(outcome, PageOutcome::Loaded { received: 10, appended: 9 });
        let outcome = feed.request_page(false).await;
        assert_eq!(outcome, PageOutcome::Loaded { received: 2, appended: 1 });

        let state = feed.snapshot();
        assert_eq!(
            ids(&state),
            vec!["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]
        );
        assert_eq!(state.offset, 12);
    }

    #[tokio::test]
    async fn test_failure_keeps_items_and_surfaces_message() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 10));
        api.push_page_error(ApiError::Transport("offline".to_string()));
        let (feed, _) = controller(&api);

        feed.request_page(false).await;
        let outcome = feed.request_page(false).await;
        assert!(matches!(outcome, PageOutcome::Failed(ApiError::Transport(_))));

        let state = feed.snapshot();
        assert_eq!(state.items.len(), 10);
        assert_eq!(state.offset, 10);
        assert!(!state.loading);
        assert_eq!(
            state.error_message.as_deref(),
            Some("Error loading cats: Network error: offline")
        );

        feed.dismiss_error();
        assert!(feed.snapshot().error_message.is_none());
    }

    #[tokio::test]
    async fn test_filter_change_resets_pagination() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 10));
        api.push_page(numbered("x", 5));
        let (feed, _) = controller(&api);

        feed.request_page(false).await;
        let outcome = feed.set_selected_tags(["x"]).await;
        assert_eq!(outcome, PageOutcome::Loaded { received: 5, appended: 5 });

        let state = feed.snapshot();
        assert_eq!(ids(&state), vec!["x0", "x1", "x2", "x3", "x4"]);
        assert_eq!(state.offset, 5);
        assert_eq!(api.page_calls()[1], (vec!["x".to_string()], 0, 10));
    }

    #[tokio::test]
    async fn test_filter_change_clears_exhaustion() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 2));
        api.push_page(numbered("x", 10));
        let (feed, _) = controller(&api);

        feed.request_page(false).await;
        assert!(feed.snapshot().exhausted);
        feed.set_selected_tags(["x"]).await;
        let state = feed.snapshot();
        assert!(!state.exhausted);
        assert_eq!(state.offset, 10);
    }

    #[tokio::test]
    async fn test_same_filter_is_a_noop() {
        let api = FakeCatApi::new();
        api.push_page(numbered("x", 10));
        let (feed, _) = controller(&api);

        feed.set_selected_tags(["x"]).await;
        assert_eq!(feed.set_selected_tags(["x"]).await, PageOutcome::FilterUnchanged);
        assert_eq!(feed.add_selected_tag("x").await, PageOutcome::FilterUnchanged);
        assert_eq!(api.page_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_add_and_remove_tag() {
        let api = FakeCatApi::new();
        let (feed, _) = controller(&api);

        feed.add_selected_tag("white").await;
        feed.add_selected_tag("cute").await;
        feed.remove_selected_tag("white").await;

        let calls: Vec<Vec<String>> = api.page_calls().into_iter().map(|(t, _, _)| t).collect();
        assert_eq!(
            calls,
            vec![
                vec!["white".to_string()],
                vec!["cute".to_string(), "white".to_string()],
                vec!["cute".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_request_is_a_noop() {
        let api = FakeCatApi::new();
        let gate = api.push_gated_page(numbered("a", 10));
        let (feed, _) = controller(&api);
        let feed = Arc::new(feed);

        let background = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.request_page(false).await })
        };
        while api.page_calls().is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(feed.snapshot().loading);
        assert_eq!(feed.request_page(false).await, PageOutcome::AlreadyLoading);
        assert_eq!(feed.request_page(true).await, PageOutcome::AlreadyLoading);

        gate.notify_one();
        let outcome = background.await.unwrap();
        assert_eq!(outcome, PageOutcome::Loaded { received: 10, appended: 10 });
        assert_eq!(api.page_calls().len(), 1);
        assert!(!feed.snapshot().loading);
    }

    #[tokio::test]
    async fn test_stale_page_is_discarded_after_filter_change() {
        let api = FakeCatApi::new();
        let gate = api.push_gated_page(numbered("old", 10));
        api.push_page(numbered("new", 3));
        let (feed, _) = controller(&api);
        let feed = Arc::new(feed);

        let stale = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.request_page(false).await })
        };
        while api.page_calls().is_empty() {
            tokio::task::yield_now().await;
        }

        let fresh = feed.set_selected_tags(["orange"]).await;
        assert_eq!(fresh, PageOutcome::Loaded { received: 3, appended: 3 });

        gate.notify_one();
        assert_eq!(stale.await.unwrap(), PageOutcome::Discarded);

        let state = feed.snapshot();
        assert_eq!(ids(&state), vec!["new0", "new1", "new2"]);
        assert_eq!(state.offset, 3);
        assert!(state.exhausted);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_item_appeared_loads_next_page_from_last_item() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 10));
        api.push_page(numbered("b", 10));
        let (feed, _) = controller(&api);

        feed.request_page(false).await;
        assert_eq!(feed.item_appeared("a3").await, None);
        let outcome = feed.item_appeared("a9").await;
        assert_eq!(outcome, Some(PageOutcome::Loaded { received: 10, appended: 10 }));
        assert_eq!(feed.snapshot().items.len(), 20);
    }

    #[tokio::test]
    async fn test_replace_refreshes_from_start() {
        let api = FakeCatApi::new();
        api.push_page(numbered("a", 10));
        api.push_page(numbered("a", 10));
        api.push_page(numbered("z", 10));
        let (feed, _) = controller(&api);

        feed.request_page(false).await;
        feed.request_page(false).await;
        feed.request_page(true).await;

        let state = feed.snapshot();
        assert_eq!(state.items[0].id, "z0");
        assert_eq!(state.items.len(), 10);
        assert_eq!(state.offset, 10);
        assert_eq!(api.page_calls()[2].1, 0);
    }

    #[tokio::test]
    async fn test_fresh_tag_cache_skips_network() {
        let api = FakeCatApi::new();
        let (feed, cache) = controller(&api);
        cache
            .store(
                vec!["white".to_string(), "cute".to_string()],
                Utc::now() - Duration::seconds(86_399),
            )
            .unwrap();

        let outcome = feed.load_tags().await;
        assert_eq!(
            outcome,
            TagsOutcome::Cached(vec!["cute".to_string(), "white".to_string()])
        );
        assert_eq!(api.tag_calls(), 0);
        assert_eq!(feed.snapshot().all_tags, vec!["cute", "white"]);
    }

    #[tokio::test]
    async fn test_expired_tag_cache_refetches_and_persists() {
        let api = FakeCatApi::new();
        api.push_tags(Ok(vec!["b".to_string(), "".to_string(), "a".to_string(), "b".to_string()]));
        let (feed, cache) = controller(&api);
        cache
            .store(vec!["old".to_string()], Utc::now() - Duration::seconds(86_401))
            .unwrap();

        let outcome = feed.load_tags().await;
        assert_eq!(outcome, TagsOutcome::Refreshed(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(api.tag_calls(), 1);

        let stored = cache.load().unwrap().unwrap();
        assert_eq!(stored.tags, vec!["a", "b"]);
        assert!(cache.is_fresh(&stored, Utc::now()));

        // Second call is served from the refreshed cache
        feed.load_tags().await;
        assert_eq!(api.tag_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_tags() {
        let api = FakeCatApi::new();
        api.push_tags(Err(ApiError::InvalidResponse("status 500".to_string())));
        let (feed, cache) = controller(&api);
        cache
            .store(vec!["old".to_string()], Utc::now() - Duration::days(3))
            .unwrap();

        let outcome = feed.load_tags().await;
        assert!(matches!(
            outcome,
            TagsOutcome::Failed { ref stale, .. } if stale == &vec!["old".to_string()]
        ));
        let state = feed.snapshot();
        assert_eq!(state.all_tags, vec!["old"]);
        assert!(!state.loading_tags);
        assert!(state
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Error loading tags"));
    }

    #[tokio::test]
    async fn test_missing_tag_cache_fetches() {
        let api = FakeCatApi::new();
        api.push_tags(Ok(vec!["x".to_string()]));
        let (feed, _) = controller(&api);
        assert_eq!(feed.load_tags().await, TagsOutcome::Refreshed(vec!["x".to_string()]));
        assert_eq!(api.tag_calls(), 1);
    }
}
