use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use newsroom::config::{CacheBackend, Config};
use newsroom::content::ArticleClient;
use newsroom::feed::HttpFetcher;
use newsroom::news::{
    Aggregator, Article, CancelHandle, ListNewsParams, ListNewsResponse, NewsError, NewsService,
};
use newsroom::storage::{Database, DatabaseError, MemoryCache, NoCache, ResponseCache};
use newsroom::util::{build_http_client, fit_width, single_line};

/// Title column width for text output
const TITLE_WIDTH: usize = 96;

/// Get the config directory path (~/.config/newsroom/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsroom"))
}

/// Create the config directory with user-only access.
fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "newsroom",
    version,
    about = "Aggregate news from BBC and Sky RSS feeds, or scrape a single article"
)]
struct Args {
    /// Config file (default: ~/.config/newsroom/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip the response cache for this invocation
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List aggregated news items
    News(NewsArgs),

    /// Fetch one article and extract its headline, summary and body
    Article {
        url: String,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Inspect or prune the SQLite response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args, Debug)]
struct NewsArgs {
    /// Comma-separated providers: bbc, sky
    #[arg(long, value_delimiter = ',')]
    providers: Option<Vec<String>>,

    /// Comma-separated categories: general, technology
    #[arg(long, value_delimiter = ',')]
    categories: Option<Vec<String>>,

    /// Ad-hoc RSS feed URL (ending in .xml); excludes --providers and --categories
    #[arg(long, value_name = "URL")]
    source_url: Option<String>,

    /// ASC or DESC (default DESC)
    #[arg(long)]
    sort: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum CacheAction {
    /// Show entry counts and size
    Stats,
    /// Delete expired entries
    Evict,
}

/// Commands that go through the news service.
enum Query {
    News(NewsArgs),
    Article { url: String, format: Format },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let argument = e
                .downcast_ref::<NewsError>()
                .is_some_and(NewsError::is_argument);
            if argument {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let query = match args.command {
        Command::Cache { action } => {
            let db = open_database(&config, &config_dir).await?;
            let result = cache_command(&db, action).await;
            db.close().await;
            return result;
        }
        Command::News(news) => Query::News(news),
        Command::Article { url, format } => Query::Article { url, format },
    };

    let backend = if args.no_cache {
        CacheBackend::Off
    } else {
        config.cache_backend
    };

    match backend {
        CacheBackend::Sqlite => {
            let db = open_database(&config, &config_dir).await?;
            let result = execute(&query, &config, db.clone()).await;
            db.close().await;
            result
        }
        CacheBackend::Memory => {
            let cache = MemoryCache::new(config.memory_cache_entries);
            execute(&query, &config, cache).await
        }
        CacheBackend::Off => execute(&query, &config, NoCache).await,
    }
}

async fn open_database(config: &Config, config_dir: &Path) -> Result<Database> {
    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => {
            ensure_config_dir(config_dir)?;
            config_dir.join("cache.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    match Database::open(db_path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::Locked) => anyhow::bail!(
            "Cache database {} is locked by another process; retry or pass --no-cache",
            db_path.display()
        ),
        Err(e) => Err(anyhow::anyhow!("Failed to open cache database: {}", e)),
    }
}

async fn cache_command(db: &Database, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Stats => {
            let stats = db.cache_stats().await.context("Failed to read cache stats")?;
            println!("entries:  {}", stats.total_entries);
            println!("expired:  {}", stats.expired_entries);
            println!("bytes:    {}", stats.total_size_bytes);
            println!("oldest:   {}", stats.oldest_entry.as_deref().unwrap_or("-"));
            println!("newest:   {}", stats.newest_entry.as_deref().unwrap_or("-"));
        }
        CacheAction::Evict => {
            let removed = db.evict_expired().await.context("Failed to evict cache")?;
            println!("Evicted {} expired entries", removed);
        }
    }
    Ok(())
}

async fn execute<C: ResponseCache>(query: &Query, config: &Config, cache: C) -> Result<()> {
    let client = build_http_client(config.allow_private_hosts)
        .context("Failed to build HTTP client")?;
    let fetcher = HttpFetcher::new(client.clone())
        .with_timeout(config.fetch_timeout())
        .with_max_bytes(config.max_feed_bytes);
    let aggregator = Aggregator::new(fetcher, config.feed_table()?, config.aggregator_options());
    let articles = ArticleClient::new(client)
        .with_timeout(config.fetch_timeout())
        .with_max_bytes(config.max_article_bytes)
        .allow_private_hosts(config.allow_private_hosts);
    let service = NewsService::new(aggregator, articles, cache).with_cache_ttl(config.cache_ttl());

    let (handle, cancel) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling in-flight fetches");
            handle.cancel();
        }
    });

    match query {
        Query::News(news) => {
            let params = ListNewsParams {
                providers: news.providers.clone(),
                categories: news.categories.clone(),
                source_url: news.source_url.clone(),
                sort: news.sort.clone(),
            };
            let response = service.list_news(&params, &cancel).await?;
            match news.format {
                Format::Json => print_json(&response)?,
                Format::Text => print_news(&response),
            }
        }
        Query::Article { url, format } => {
            let article = service.get_article(url, &cancel).await?;
            match format {
                Format::Json => print_json(&article)?,
                Format::Text => print_article(&article),
            }
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn print_news(response: &ListNewsResponse) {
    for item in &response.news {
        println!(
            "{}  {:<5}  {}",
            item.publish_date.format("%Y-%m-%d %H:%M"),
            item.provider,
            fit_width(&single_line(&item.title), TITLE_WIDTH)
        );
        if !item.link.is_empty() {
            println!("{:25}{}", "", single_line(&item.link));
        }
    }
}

fn print_article(article: &Article) {
    println!("{}", single_line(&article.title));
    if !article.description.is_empty() {
        println!("{}", single_line(&article.description));
    }
    println!();
    println!("{}", article.content);
}
