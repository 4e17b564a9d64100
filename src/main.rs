//! Headless driver for the cats client: the feed, tags, favorites and the
//! cat of the day from a terminal.

use anyhow::{Context, Result};
use cats_client::daily::{caption, DailyCat};
use cats_client::detail::DetailController;
use cats_client::models::extension_for_mime;
use cats_client::paths::{get_config_path, get_db_path, get_downloads_dir};
use cats_client::{
    CatApi, CatService, ClientConfig, Database, FavoritesStore, FeedController, PageOutcome,
    Scope, TagCache, TagsOutcome,
};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cats")]
#[command(version, about = "Browse and favorite cats from cataas.com", long_about = None)]
struct Cli {
    /// Directory holding the database and config (defaults to the app data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List images, optionally filtered by tags
    Feed {
        #[arg(short, long)]
        tag: Vec<String>,
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },
    /// List all known tags (cached for a day)
    Tags,
    /// Show one image with related images per tag
    Detail { id: String },
    Favorite { id: String },
    Unfavorite { id: String },
    /// List favorites sorted by id
    Favorites,
    /// Save today's random cat image
    Daily {
        #[arg(long)]
        refresh: bool,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

// ============ Bootstrap ============

struct App {
    config: ClientConfig,
    api: Arc<dyn CatApi>,
    db: Database,
    downloads_dir: PathBuf,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn bootstrap(data_dir: Option<PathBuf>) -> Result<App> {
    let (db_path, config_path, downloads_dir) = match data_dir {
        Some(dir) => (
            dir.join("cats.db"),
            dir.join("config.json"),
            dir.join("Downloads"),
        ),
        None => (
            get_db_path().map_err(anyhow::Error::msg)?,
            get_config_path().map_err(anyhow::Error::msg)?,
            get_downloads_dir().map_err(anyhow::Error::msg)?,
        ),
    };

    let config = ClientConfig::load_from(&config_path).map_err(anyhow::Error::msg)?;
    if !config_path.exists() {
        config.save_to(&config_path).map_err(anyhow::Error::msg)?;
        info!("[config] wrote defaults to {}", config_path.display());
    }

    let api: Arc<dyn CatApi> =
        Arc::new(CatService::from_config(&config).context("Invalid base_url in config")?);
    let db = Database::open_at(&db_path).context("Failed to open database")?;

    Ok(App {
        config,
        api,
        db,
        downloads_dir,
    })
}

fn favorites_store(app: &App) -> FavoritesStore {
    let store = FavoritesStore::new(app.db.clone());
    store.subscribe(Scope::All, |_| info!("[favorites] favorites changed"));
    store
}

// ============ Commands ============

async fn run_feed(app: &App, tags: Vec<String>, pages: u32) -> Result<()> {
    let tag_cache = TagCache::with_ttl(app.db.clone(), app.config.tag_cache_ttl_secs);
    let feed = FeedController::with_page_size(app.api.clone(), tag_cache, app.config.page_size);
    let favorites = FavoritesStore::new(app.db.clone());

    let mut outcome = if tags.is_empty() {
        feed.request_page(true).await
    } else {
        feed.set_selected_tags(tags).await
    };
    for _ in 1..pages {
        if !matches!(outcome, PageOutcome::Loaded { .. }) {
            break;
        }
        outcome = feed.request_page(false).await;
    }

    let state = feed.snapshot();
    if let Some(message) = &state.error_message {
        eprintln!("{}", message);
    }
    for cat in &state.items {
        let star = if favorites.is_favorited(&cat.id)? { "*" } else { " " };
        println!(
            "{} {}  [{}]  {}",
            star,
            cat.id,
            cat.tags.join(", "),
            cat.image_url_on(&app.config.base_url, None, None)?
        );
    }
    println!(
        "{} images, offset {}{}",
        state.items.len(),
        state.offset,
        if state.exhausted { ", no more results" } else { "" }
    );
    Ok(())
}

async fn run_tags(app: &App) -> Result<()> {
    let tag_cache = TagCache::with_ttl(app.db.clone(), app.config.tag_cache_ttl_secs);
    let feed = FeedController::with_page_size(app.api.clone(), tag_cache, app.config.page_size);

    let tags = match feed.load_tags().await {
        TagsOutcome::Cached(tags) | TagsOutcome::Refreshed(tags) => tags,
        TagsOutcome::Failed { error, stale } => {
            eprintln!("Error loading tags: {}", error);
            stale
        }
    };
    for tag in tags {
        println!("{}", tag);
    }
    Ok(())
}

async fn run_detail(app: &App, id: &str) -> Result<()> {
    let record = app.api.fetch_single(id).await?;
    let detail =
        DetailController::with_related_limit(app.api.clone(), record, app.config.related_limit);
    detail.load_all_related().await;

    let state = detail.snapshot();
    let cat = &state.record;
    println!("{}  ({})", cat.id, cat.mime_type);
    if let Some(size) = cat.size {
        println!("size: {}", size);
    }
    if let Some(created) = cat.created_at {
        println!("created at: {}", created.format("%Y-%m-%d %H:%M"));
    }
    if let Some(edited) = cat.edited_at {
        println!("updated at: {}", edited.format("%Y-%m-%d %H:%M"));
    }
    for (tag, related) in &state.related {
        let ids: Vec<&str> = related.iter().map(|c| c.id.as_str()).collect();
        println!("#{}: {}", tag, ids.join(" "));
    }
    if let Some(message) = state.error_message {
        eprintln!("{}", message);
    }
    Ok(())
}

async fn run_favorite(app: &App, id: &str) -> Result<()> {
    let record = app.api.fetch_single(id).await?;
    favorites_store(app).favorite(&record)?;
    println!("Favorited {}", record.id);
    Ok(())
}

fn run_unfavorite(app: &App, id: &str) -> Result<()> {
    favorites_store(app).unfavorite(id)?;
    println!("Unfavorited {}", id);
    Ok(())
}

fn run_favorites(app: &App) -> Result<()> {
    let favorites = FavoritesStore::new(app.db.clone()).list_favorites()?;
    if favorites.is_empty() {
        println!("No favorites yet");
    }
    for cat in favorites {
        println!("{}  [{}]", cat.id, cat.tags.join(", "));
    }
    Ok(())
}

async fn run_daily(app: &App, refresh: bool, out: Option<PathBuf>) -> Result<()> {
    let daily = DailyCat::new(app.api.clone(), app.db.clone());
    let bytes = daily.image(refresh).await?;

    let today = chrono::Local::now().date_naive();
    let out = match out {
        Some(path) => path,
        None => {
            // cataas serves the random cat as JPEG unless asked otherwise
            let name = format!("cat-{}.{}", today.format("%Y-%m-%d"), extension_for_mime("image/jpeg"));
            app.downloads_dir.join(name)
        }
    };
    if let Some(parent) = out.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&out, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("{} -> {}", caption(today), out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let app = bootstrap(cli.data_dir)?;

    match cli.command {
        Command::Feed { tag, pages } => run_feed(&app, tag, pages).await,
        Command::Tags => run_tags(&app).await,
        Command::Detail { id } => run_detail(&app, &id).await,
        Command::Favorite { id } => run_favorite(&app, &id).await,
        Command::Unfavorite { id } => run_unfavorite(&app, &id),
        Command::Favorites => run_favorites(&app),
        Command::Daily { refresh, out } => run_daily(&app, refresh, out).await,
    }
}
