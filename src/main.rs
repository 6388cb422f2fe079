use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use post_herald::config::{LoggingConfig, MetricsConfig};
use post_herald::models::{Platform, ResolvedPost};
use post_herald::{AppConfig, Herald};

#[derive(Debug, Parser)]
#[command(name = "post-herald", version, about = "Announces new posts from your social profiles exactly once")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll every platform on a schedule until interrupted
    Run,
    /// Resolve the latest post without announcing it
    Latest {
        /// Platform id, or `all`
        target: String,
    },
    /// Pin a platform's latest post to a link
    SetLatest {
        #[arg(value_parser = parse_platform)]
        platform: Platform,
        link: String,
    },
    /// Remove a pinned link
    ClearLatest {
        #[arg(value_parser = parse_platform)]
        platform: Platform,
    },
    /// Pin the first recognizable post link found in the text
    Detect { text: String },
    /// Record every current post as announced without announcing
    Seed,
    /// Print the announcement history and pinned links
    History,
}

fn parse_platform(value: &str) -> std::result::Result<Platform, String> {
    value.parse().map_err(|e: post_herald::AppError| e.to_string())
}

/// `RUST_LOG` when set, otherwise warnings plus this crate at info.
fn log_filter(rust_log: Option<&str>) -> Result<EnvFilter> {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => Ok(EnvFilter::try_new(directives)?),
        _ => Ok(EnvFilter::new("warn").add_directive("post_herald=info".parse()?)),
    }
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())?;

    let Some(directory) = &config.directory else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return Ok(None);
    };

    let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .install()
        .context("installing Prometheus exporter")?;
    info!(port = config.port, "Metrics exporter listening");
    Ok(())
}

fn print_post(platform: Platform, post: Option<&ResolvedPost>) {
    match post {
        Some(post) => {
            let date = post
                .published_at
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<10} {}\n{:<10} {}\n{:<10} {}", platform, post.title, "", post.link, "", date);
        }
        None => println!("{:<10} (unavailable)", platform),
    }
}

async fn run(herald: &Herald) -> Result<()> {
    let mut scheduler = herald.scheduler().await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    scheduler.shutdown().await?;
    let stats = scheduler.stats().await;
    info!(
        cycles_run = stats.cycles_run,
        cycles_skipped = stats.cycles_skipped,
        announcements = stats.announcements,
        "Scheduler stopped"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("loading configuration")?;
    let _log_guard = init_tracing(&config.logging)?;
    init_metrics(&config.metrics)?;

    info!("Starting Post Herald...");
    let herald = Herald::new(config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&herald).await?,
        Command::Latest { target } => {
            if target.eq_ignore_ascii_case("all") {
                for (platform, post) in herald.latest_all().await {
                    print_post(platform, post.as_ref());
                }
            } else {
                let platform: Platform = target.parse()?;
                print_post(platform, herald.latest(platform).await.as_ref());
            }
        }
        Command::SetLatest { platform, link } => {
            let entry = herald.set_latest(platform, &link).await?;
            println!("{} latest post set to {}", platform, entry.link);
        }
        Command::ClearLatest { platform } => {
            if herald.clear_latest(platform).await? {
                println!("{} override cleared", platform);
            } else {
                println!("{} had no override", platform);
            }
        }
        Command::Detect { text } => match herald.detect(&text).await? {
            Some((platform, entry)) => println!("Detected {} post: {}", platform, entry.link),
            None => println!("No supported platform link found"),
        },
        Command::Seed => {
            for (platform, outcome) in herald.seed().await? {
                println!("{:<10} {:?}", platform, outcome);
            }
        }
        Command::History => {
            println!("History ({})", herald.history().path().display());
            for (platform, link) in herald.history().snapshot().await? {
                println!("  {:<10} {}", platform, link);
            }
            println!("Overrides ({})", herald.overrides().path().display());
            for (platform, entry) in herald.overrides().snapshot().await? {
                println!("  {:<10} {} (set {})", platform, entry.link, entry.set_at.to_rfc3339());
            }
        }
    }

    Ok(())
}
