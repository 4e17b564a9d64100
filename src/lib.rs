//! Client core for browsing, filtering and favoriting cataas.com images
//!
//! The [`api`] gateway talks to the remote API, [`feed::FeedController`]
//! drives tag-filtered pagination, and [`favorites::FavoritesStore`] keeps
//! the user's favorites on device. Presentation layers hold these behind
//! `Arc` and render their snapshots.

pub mod api;
pub mod config;
pub mod daily;
pub mod db;
pub mod detail;
pub mod error;
pub mod favorites;
pub mod feed;
pub mod models;
pub mod paths;
pub mod tags;

#[cfg(test)]
mod testing;

pub use api::{CatApi, CatService};
pub use config::ClientConfig;
pub use db::Database;
pub use error::{ApiError, Error, StoreError};
pub use favorites::{FavoriteEvent, FavoritesStore, Scope};
pub use feed::{FeedController, FeedState, PageOutcome, TagsOutcome};
pub use models::ImageRecord;
pub use tags::TagCache;
