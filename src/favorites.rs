//! Durable set of favorited images with change observers

use crate::db::Database;
use crate::error::StoreError;
use crate::models::ImageRecord;
use log::{error, info};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// What a listener wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Any change to the favorites set.
    All,
    /// Changes to one image's favorite state.
    Image(String),
}

/// Delivered to listeners after a write has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteEvent {
    /// The favorite state of this image changed.
    Updated { id: String },
    /// The favorites set as a whole changed.
    ListChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&FavoriteEvent) + Send + Sync>;

pub struct FavoritesStore {
    db: Database,
    listeners: Mutex<BTreeMap<SubscriptionId, (Scope, Listener)>>,
    next_subscription: AtomicU64,
}

impl FavoritesStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            listeners: Mutex::new(BTreeMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn is_favorited(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.db.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM favorites WHERE id = ?1",
                params![id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Marks `record` as favorite. Favoriting an already favorited id keeps
    /// the stored entry untouched.
    pub fn favorite(&self, record: &ImageRecord) -> Result<(), StoreError> {
        let result = self.insert(record);
        if let Err(e) = &result {
            error!("[favorites] failed to favorite {}: {}", record.id, e);
        }
        result?;
        info!("[favorites] favorited {}", record.id);
        self.notify(&record.id);
        Ok(())
    }

    fn insert(&self, record: &ImageRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO favorites (id, record, favorited_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO NOTHING",
            params![record.id, json, now],
        )?;
        Ok(())
    }

    /// Removes the favorite mark; unknown ids are a no-op.
    pub fn unfavorite(&self, id: &str) -> Result<(), StoreError> {
        let result = self.delete(id);
        if let Err(e) = &result {
            error!("[favorites] failed to unfavorite {}: {}", id, e);
        }
        result?;
        info!("[favorites] unfavorited {}", id);
        self.notify(id);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        conn.execute("DELETE FROM favorites WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Flips the favorite state and returns the new one.
    pub fn toggle(&self, record: &ImageRecord) -> Result<bool, StoreError> {
        if self.is_favorited(&record.id)? {
            self.unfavorite(&record.id)?;
            Ok(false)
        } else {
            self.favorite(record)?;
            Ok(true)
        }
    }

    /// All favorites sorted by id ascending.
    pub fn list_favorites(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare("SELECT record FROM favorites ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut favorites: Vec<ImageRecord> = Vec::new();
        for json in rows {
            let record: ImageRecord = serde_json::from_str(&json?)?;
            if favorites.last() != Some(&record) {
                favorites.push(record);
            }
        }
        Ok(favorites)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM favorites", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Registers a listener; it stays active until [`Self::unsubscribe`].
    pub fn subscribe<F>(&self, scope: Scope, listener: F) -> SubscriptionId
    where
        F: Fn(&FavoriteEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        match self.listeners.lock() {
            Ok(mut listeners) => {
                listeners.insert(id, (scope, Arc::new(listener)));
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id, (scope, Arc::new(listener)));
            }
        }
        id
    }

    /// Returns false when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.remove(&id).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&id).is_some(),
        }
    }

    fn notify(&self, id: &str) {
        // Snapshot first so listeners may call back into the store
        let (per_image, global): (Vec<Listener>, Vec<Listener>) = {
            let listeners = match self.listeners.lock() {
                Ok(l) => l,
                Err(poisoned) => poisoned.into_inner(),
            };
            let per_image = listeners
                .values()
                .filter(|(scope, _)| matches!(scope, Scope::Image(target) if target == id))
                .map(|(_, l)| Arc::clone(l))
                .collect();
            let global = listeners
                .values()
                .filter(|(scope, _)| *scope == Scope::All)
                .map(|(_, l)| Arc::clone(l))
                .collect();
            (per_image, global)
        };

        let updated = FavoriteEvent::Updated { id: id.to_string() };
        for listener in per_image {
            listener(&updated);
        }
        for listener in global {
            listener(&FavoriteEvent::ListChanged);
        }
    }
}
