use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use fluxsync::config::Config;
use fluxsync::miniflux::{build_http_client, Client};
use fluxsync::storage::{ArticleFilter, ArticleQuery, Database, DatabaseError};
use fluxsync::sync::{LocalStore, SyncReport, SyncService};
use fluxsync::util::{fit_width, sanitize_line};

/// Column budget for titles in list output
const TITLE_WIDTH: usize = 60;

/// Get the config directory path (~/.config/fluxsync/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("fluxsync"))
}

#[derive(Parser)]
#[command(
    name = "fluxsync",
    version,
    about = "Sync a Miniflux account into a local SQLite feed store"
)]
struct Args {
    /// Miniflux server URL (overrides MINIFLUX_URL and config.toml)
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    /// Miniflux API token (overrides MINIFLUX_API_KEY and config.toml)
    #[arg(long, global = true, value_name = "TOKEN")]
    api_key: Option<String>,

    /// Database file (default: ~/.config/fluxsync/rss.db)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/fluxsync/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify the server address and API token
    Check,

    /// List feeds on the server, or stored locally with --local
    Feeds {
        #[arg(long)]
        local: bool,
    },

    /// Pull unread entries into the local store
    Sync {
        /// Mark synced entries as read on the server
        #[arg(long)]
        mark_read: bool,

        /// Maximum unread entries to fetch
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        limit: Option<u32>,

        /// Keep running, syncing every `sync_interval_minutes` until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// List locally stored articles, newest first
    Articles {
        #[arg(long)]
        unread: bool,

        #[arg(long, conflicts_with = "unread")]
        starred: bool,

        #[arg(long, value_name = "N", default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_private_dir(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?
        .with_env_overrides();
    if let Some(server) = &args.server {
        config.server_url = Some(server.clone());
    }
    if let Some(key) = &args.api_key {
        config.api_key = Some(SecretString::from(key.clone()));
    }
    tracing::debug!(config = ?config, "Effective configuration");

    let db_path = args.db.clone().unwrap_or_else(|| config_dir.join("rss.db"));

    // Ctrl-C cancels whatever is in flight
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    match args.command {
        Command::Check => {
            let client = build_client(&config)?;
            client
                .test_connection(&cancel)
                .await
                .context("Connection check failed")?;
            println!("Connected to {}", client.base_url());
        }
        Command::Feeds { local: false } => {
            let client = build_client(&config)?;
            let feeds = client
                .get_feeds(&cancel)
                .await
                .context("Failed to list remote feeds")?;
            for feed in &feeds {
                println!(
                    "{:>6}  {:<width$}  {}",
                    feed.id,
                    fit_width(&sanitize_line(&feed.title), TITLE_WIDTH),
                    sanitize_line(&feed.category.title),
                    width = TITLE_WIDTH
                );
            }
            println!("{} feeds", feeds.len());
        }
        Command::Feeds { local: true } => {
            let db = open_database(&db_path).await?;
            let feeds = db.get_feeds().await.context("Failed to load feeds")?;
            let counts = db
                .unread_counts()
                .await
                .context("Failed to count unread articles")?;
            for feed in &feeds {
                let unread = counts
                    .iter()
                    .find(|(id, _)| *id == feed.id)
                    .map_or(0, |(_, n)| *n);
                println!(
                    "{:>6}  {:<width$}  {:>5} unread",
                    feed.id,
                    fit_width(&sanitize_line(&feed.title), TITLE_WIDTH),
                    unread,
                    width = TITLE_WIDTH
                );
            }
        }
        Command::Sync {
            mark_read,
            limit,
            watch,
        } => {
            let mut options = config.sync_options();
            options.mark_remote_read |= mark_read;
            if let Some(limit) = limit {
                options.entry_limit = limit;
            }

            let client = build_client(&config)?;
            let db = open_database(&db_path).await?;
            let service = SyncService::new(client, db, options);

            if watch {
                let interval = config.sync_interval();
                if interval.is_zero() {
                    anyhow::bail!("sync_interval_minutes must be greater than 0 for --watch");
                }
                run_watch(&service, interval, &cancel).await;
            } else {
                let report = service.sync(&cancel).await.context("Sync failed")?;
                print_report(&report);
            }
        }
        Command::Articles {
            unread,
            starred,
            limit,
        } => {
            let db = open_database(&db_path).await?;
            let filter = if unread {
                ArticleFilter::Unread
            } else if starred {
                ArticleFilter::Starred
            } else {
                ArticleFilter::All
            };
            let articles = db
                .get_articles(&ArticleQuery {
                    filter,
                    limit,
                    ..ArticleQuery::default()
                })
                .await
                .context("Failed to load articles")?;
            for article in &articles {
                let date = chrono::DateTime::from_timestamp(article.published, 0)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!(
                    "{} {}  {:<10}  {}",
                    if article.read { ' ' } else { '*' },
                    if article.starred { '★' } else { ' ' },
                    date,
                    fit_width(&sanitize_line(&article.title), TITLE_WIDTH)
                );
            }
            println!("{} articles", articles.len());
        }
    }

    Ok(())
}

/// Create the config directory if needed and restrict it to the current user.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).context("Failed to create config directory")?;
        tracing::info!(path = %dir.display(), "Created config directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(dir, perms) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

fn build_client(config: &Config) -> Result<Client> {
    let server = config.require_server_url()?;
    let api_key = config.require_api_key()?;
    let http = build_http_client().context("Failed to build HTTP client")?;
    Ok(Client::new(http, server, api_key).with_timeout(config.request_timeout()))
}

async fn open_database(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => anyhow::bail!(
            "Database {} is locked by another fluxsync process",
            path.display()
        ),
        Err(e) => Err(e).with_context(|| format!("Failed to open database {}", path.display())),
    }
}

/// Run passes back to back with `interval` between them until cancelled.
///
/// A failed pass is reported and the loop carries on; the next pass
/// deduplicates whatever the failed one managed to write.
async fn run_watch<S: LocalStore>(
    service: &SyncService<S>,
    interval: Duration,
    cancel: &CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting sync loop");
    loop {
        match service.sync(cancel).await {
            Ok(report) => print_report(&report),
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                tracing::warn!(error = %e, "Sync pass failed");
                eprintln!("Sync failed: {}", e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    println!("Sync loop stopped.");
}

fn print_report(report: &SyncReport) {
    println!(
        "Synced {} new articles ({} duplicates, {} without URL) from {} fetched of {} unread",
        report.articles_added,
        report.duplicates_skipped,
        report.invalid_skipped,
        report.entries_fetched,
        report.remote_total
    );
    if report.feeds_mirrored > 0 {
        println!("Mirrored {} new feeds", report.feeds_mirrored);
    }
    if report.entries_marked_read > 0 {
        println!("Marked {} entries read on the server", report.entries_marked_read);
    }
}
