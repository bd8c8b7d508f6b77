use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rssplug_archive::{Archive, ArchiveConfig};
use rssplug_common::{AppConfig, FileConfig};
use rssplug_events::{BlobStore, EntryStore};
use rssplug_ingest::{preview_feed, Plug, PlugConfig};

#[derive(Parser)]
#[command(name = "rssplug", about = "Republish an RSS/Atom feed into an append-only log")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, default_value = "./rssplug.toml")]
    config: PathBuf,

    /// Override the poll interval from the config file
    #[arg(long)]
    poll_minutes: Option<u64>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Print the newest item of this feed as markdown and exit
    feed: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Some(feed_url) = &cli.feed {
        return preview(&cli, feed_url).await;
    }

    info!(config = %cli.config.display(), "Starting rssplug");
    let file_config = FileConfig::load(&cli.config).with_context(|| {
        format!(
            "Config file not usable: {}. Create one or specify --config <path>",
            cli.config.display()
        )
    })?;
    let config = AppConfig::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&config.database_url)
        .await
        .context("Connecting to the database")?;
    rssplug_events::migrate(&pool).await?;
    info!("Migrations complete");

    let archive = Arc::new(Archive::new(archive_config(&file_config))?);
    let log = Arc::new(EntryStore::new(pool.clone(), file_config.publish.author.clone()));
    let blobs = Arc::new(BlobStore::new(pool.clone()));

    let mut plug = Plug::new(
        PlugConfig {
            feed_url: file_config.feed.url.clone(),
            avatar: file_config.feed.avatar.clone(),
            ceiling: file_config.publish.ceiling,
        },
        archive.clone(),
        archive,
        blobs,
        log.clone(),
        log,
    );

    let result = if cli.once {
        plug.tick().await.map(|report| info!(%report, "Single tick complete"))
    } else {
        let interval = cli
            .poll_minutes
            .map(|minutes| Duration::from_secs(minutes.max(1) * 60))
            .unwrap_or_else(|| file_config.poll.interval());
        plug.run(interval, shutdown_signal()).await
    };

    pool.close().await;
    info!("Database pool closed");

    result.map_err(Into::into)
}

async fn preview(cli: &Cli, feed_url: &str) -> Result<()> {
    let archive = Archive::new(preview_archive_config(&cli.config))?;

    let markdown = preview_feed(&archive, feed_url).await?;
    println!("{markdown}");
    Ok(())
}

/// Preview needs no database and the config file is optional. A file that
/// exists but does not load is reported, then defaults are used.
fn preview_archive_config(path: &Path) -> ArchiveConfig {
    if !path.exists() {
        return ArchiveConfig::default();
    }
    match FileConfig::load(path) {
        Ok(file_config) => archive_config(&file_config),
        Err(e) => {
            warn!(
                config = %path.display(),
                error = %format!("{e:#}"),
                "Config file unusable, previewing with default HTTP settings"
            );
            ArchiveConfig::default()
        }
    }
}

fn archive_config(file_config: &FileConfig) -> ArchiveConfig {
    ArchiveConfig {
        feed_timeout: file_config.http.feed_timeout(),
        media_timeout: file_config.http.media_timeout(),
        user_agent: file_config.http.user_agent.clone(),
    }
}

/// Flips to true on Ctrl-C or SIGTERM.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl-C"),
            _ = terminate => info!("Received SIGTERM"),
        }
        let _ = tx.send(true);
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rssplug-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn preview_uses_http_settings_from_a_valid_config() {
        let path = write_config(
            "valid",
            r#"
[feed]
url = "https://example.com/feed.xml"

[publish]
author = "@plug"

[http]
feed_timeout_secs = 5
user_agent = "preview-test"
"#,
        );

        let config = preview_archive_config(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.feed_timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "preview-test");
    }

    #[test]
    fn preview_falls_back_when_config_is_malformed() {
        let path = write_config("malformed", "[feed\nurl = ");

        let config = preview_archive_config(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.feed_timeout, ArchiveConfig::default().feed_timeout);
        assert_eq!(config.user_agent, ArchiveConfig::default().user_agent);
    }

    #[test]
    fn preview_without_config_file_uses_defaults() {
        let path = std::env::temp_dir().join("rssplug-does-not-exist.toml");

        let config = preview_archive_config(&path);

        assert_eq!(config.media_timeout, ArchiveConfig::default().media_timeout);
    }
}
