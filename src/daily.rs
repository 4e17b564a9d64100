//! Cat of the day for the watch and widget surfaces
//!
//! One random image per calendar day, cached in the key-value table so the
//! companion surfaces can show it offline.

use crate::api::CatApi;
use crate::db::Database;
use crate::error::{Result, StoreError};
use chrono::{Local, NaiveDate};
use log::{info, warn};
use std::sync::Arc;

const IMAGE_KEY: &str = "cachedCatImage";
const DATE_KEY: &str = "lastFetchedDate";

pub struct DailyCat {
    api: Arc<dyn CatApi>,
    db: Database,
}

impl DailyCat {
    pub fn new(api: Arc<dyn CatApi>, db: Database) -> Self {
        Self { api, db }
    }

    /// Today's image, from cache unless `bypass_cache` is set.
    pub async fn image(&self, bypass_cache: bool) -> Result<Vec<u8>> {
        self.image_for(Local::now().date_naive(), bypass_cache).await
    }

    pub async fn image_for(&self, day: NaiveDate, bypass_cache: bool) -> Result<Vec<u8>> {
        if !bypass_cache {
            match self.cached(day) {
                Ok(Some(bytes)) => return Ok(bytes),
                Ok(None) => {}
                Err(e) => warn!("[daily] cache unreadable: {}", e),
            }
        }

        let bytes = self.api.fetch_random_image_bytes().await?;
        info!("[daily] fetched {} bytes for {}", bytes.len(), day);
        if let Err(e) = self.store(day, &bytes) {
            warn!("[daily] failed to cache image for {}: {}", day, e);
        }
        Ok(bytes)
    }

    /// Cached bytes, only if they were fetched on `day`.
    pub fn cached(&self, day: NaiveDate) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        let Some(stamp) = self.db.get_value(DATE_KEY)? else {
            return Ok(None);
        };
        let fetched_on: NaiveDate = serde_json::from_slice(&stamp)?;
        if fetched_on != day {
            return Ok(None);
        }
        self.db.get_value(IMAGE_KEY)
    }

    fn store(&self, day: NaiveDate, bytes: &[u8]) -> std::result::Result<(), StoreError> {
        let stamp = serde_json::to_vec(&day)?;
        self.db
            .set_values(&[(IMAGE_KEY, bytes), (DATE_KEY, stamp.as_slice())])
    }
}

/// "Cat for October 19"
pub fn caption(day: NaiveDate) -> String {
    format!("Cat for {}", day.format("%B %-d"))
}
