use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use showreel::config::Config;
use showreel::domain::{Category, Item};
use showreel::fetch::HttpFetcher;
use showreel::list::ListController;
use showreel::repository::Repository;
use showreel::storage::{
    CacheStats, Database, DatabaseError, LayeredCache, MemoryCache, NoCache, RecentQueries,
    ResponseCache,
};
use showreel::use_cases::UseCases;
use showreel::util::{fit_to_width, sanitize_line};

/// Get the config directory path (~/.config/showreel/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("showreel");
    Ok(config_dir)
}

fn parse_fixed_category(s: &str) -> Result<Category, String> {
    Category::parse_fixed(s).map_err(|e| {
        let names: Vec<&str> = Category::FIXED.iter().map(Category::as_str).collect();
        format!(
            "{e} (expected one of {}; use --search TEXT to search)",
            names.join(", ")
        )
    })
}

#[derive(Parser, Debug)]
#[command(name = "showreel", about = "Cache-first paginated movie listings")]
struct Args {
    /// Category to list: popular, top-rated or upcoming
    #[arg(long, value_name = "NAME", default_value = "upcoming", value_parser = parse_fixed_category)]
    category: Category,

    /// Search movies by title instead of listing a category
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,

    /// Number of pages to load
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=50))]
    pages: u32,

    /// Print recent search queries and exit
    #[arg(long)]
    recent: bool,

    /// Delete expired cached pages before loading
    #[arg(long)]
    evict_cache: bool,

    /// Print page cache statistics and exit
    #[arg(long)]
    cache_stats: bool,

    /// Delete every cached page and exit
    #[arg(long)]
    clear_cache: bool,

    /// Forget recent search queries and exit
    #[arg(long)]
    clear_recent: bool,

    /// Bypass the page cache entirely
    #[arg(long)]
    no_cache: bool,

    /// Config file (default: ~/.config/showreel/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Truncate titles to this many columns
    #[arg(long, value_name = "COLS", default_value_t = 60)]
    width: usize,
}

fn print_items(items: &[Item], width: usize) {
    for (index, item) in items.iter().enumerate() {
        let title = sanitize_line(&item.title);
        let year = item
            .release_date
            .map(|d| d.format("%Y").to_string())
            .unwrap_or_else(|| "----".to_string());
        println!("{:>4}  {}  {}", index + 1, year, fit_to_width(&title, width));
    }
}

fn print_cache_stats(stats: &CacheStats) {
    println!("Cached pages:  {}", stats.total_entries);
    println!("Expired:       {}", stats.expired_entries);
    println!("Size:          {} bytes", stats.total_size_bytes);
    println!(
        "Oldest:        {}",
        stats.oldest_entry.as_deref().unwrap_or("-")
    );
    println!(
        "Newest:        {}",
        stats.newest_entry.as_deref().unwrap_or("-")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so listings can be piped
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(config = ?config, "Effective configuration");

    // Open database
    let db_path = config_dir.join("cache.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db
            .with_cache_ttl_hours(config.cache_ttl_hours)
            .with_recent_limit(config.recent_queries_limit),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of showreel appears to be using the cache. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    // Handle --recent flag
    if args.recent {
        let recent = db
            .recent_queries(config.recent_queries_limit)
            .await
            .context("Failed to read recent queries")?;
        if recent.is_empty() {
            println!("No recent searches.");
        }
        for query in recent {
            println!("{}", sanitize_line(query.as_str()));
        }
        db.close().await;
        return Ok(());
    }

    // Maintenance flags run and exit without loading a listing
    if args.cache_stats || args.clear_cache || args.clear_recent {
        if args.clear_cache {
            let removed = db
                .clear_page_cache()
                .await
                .context("Failed to clear page cache")?;
            println!("Removed {removed} cached pages.");
        }
        if args.clear_recent {
            let removed = db
                .clear_recent_queries()
                .await
                .context("Failed to clear recent queries")?;
            println!("Forgot {removed} recent searches.");
        }
        if args.cache_stats {
            let stats = db
                .cache_stats()
                .await
                .context("Failed to read cache statistics")?;
            print_cache_stats(&stats);
        }
        db.close().await;
        return Ok(());
    }

    // Handle --evict-cache flag
    if args.evict_cache {
        let evicted = db
            .evict_expired()
            .await
            .context("Failed to evict expired cache entries")?;
        tracing::info!(evicted, "Evicted expired cache entries");
    }

    let cache: Arc<dyn ResponseCache> = if args.no_cache {
        Arc::new(NoCache)
    } else if config.memory_cache_entries == 0 {
        Arc::new(db.clone())
    } else {
        Arc::new(LayeredCache::new(
            Arc::new(MemoryCache::new(config.memory_cache_entries)),
            Arc::new(db.clone()),
        ))
    };

    if config.api_key().is_none() {
        tracing::warn!("No API key configured; requests will likely be rejected");
    }
    let fetcher = HttpFetcher::from_config(&config).context("Failed to build HTTP client")?;

    let repository = Repository::new(Arc::new(fetcher), cache);
    let background = repository.background().clone();
    let recent: Arc<dyn RecentQueries> = Arc::new(db.clone());
    let mut list = ListController::new(UseCases::new(repository, recent));

    match args.search.as_deref() {
        Some(text) => list.did_search(text),
        None if args.category == Category::Upcoming => list.view_did_load(),
        None => list.did_select_tab(args.category),
    }
    list.run_until_idle().await;

    while list.current_page() < args.pages && list.has_more_pages() {
        let before = list.current_page();
        list.did_load_next_page();
        list.run_until_idle().await;
        if list.current_error().is_some() || list.current_page() <= before {
            break;
        }
    }

    // Cache write-backs and recent-query saves are still running detached;
    // the pool only waits for connections already checked out
    background.drain().await;
    db.close().await;

    if let Some(message) = list.current_error() {
        eprintln!("{}: {}", list.error_title(), message);
        std::process::exit(1);
    }

    println!(
        "{} ({}, page {} of {})",
        list.screen_title(),
        list.mode(),
        list.current_page(),
        list.total_pages()
    );
    if list.is_empty() {
        println!("No {}.", list.empty_data_title().to_lowercase());
    } else {
        print_items(&list.current_items(), args.width);
    }

    Ok(())
}
