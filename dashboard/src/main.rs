//! Dashboard entry point.
//!
//! Reads commands from stdin (`help` lists them) and redraws the screen on
//! stdout after every change.  Logs go to stderr as JSON.
//!
//! # Environment variables
//! | Var                             | Default                    |
//! |---------------------------------|----------------------------|
//! | `STREAMSTATS_BASE_URL`          | `https://api.pulstream.so` |
//! | `STREAMSTATS_DEFAULT_PAGE_SIZE` | `20`                       |
//! | `DASHBOARD_PROXY_URL`           | `http://localhost:3000`    |
//!
//! See `streamstats::config` for the remaining `STREAMSTATS_*` settings.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use streamstats::{HttpStreamSource, StatsConfig, StreamSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use dashboard::{render_dashboard, Session, StreamFilters, ViewController};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// Talk to the stats API directly
    Upstream,
    /// Go through a running stats-proxy
    Proxy,
}

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Live stream statistics in the terminal", long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value_t = SourceKind::Upstream)]
    source: SourceKind,

    /// Base URL of the stats-proxy when `--source proxy`
    #[arg(long, env = "DASHBOARD_PROXY_URL", default_value = "http://localhost:3000")]
    proxy_url: String,

    /// Shared view, e.g. `sortBy=created_at&sortOrder=ASC&limit=50&offset=100`
    #[arg(long)]
    query: Option<String>,

    /// Start with auto refresh on
    #[arg(long)]
    poll: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dashboard=info".parse()?)
                .add_directive("streamstats=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = StatsConfig::from_env()?;
    let source: Arc<dyn StreamSource> = match args.source {
        SourceKind::Upstream => Arc::new(HttpStreamSource::upstream(&config)?),
        SourceKind::Proxy => Arc::new(HttpStreamSource::proxy(&args.proxy_url, &config)?),
    };

    let filters = match &args.query {
        Some(q) => StreamFilters::from_query_string(q, config.default_page_size),
        None => StreamFilters::new(config.default_page_size),
    };
    let mut controller = ViewController::with_filters(filters, config);
    controller.set_polling(args.poll);
    info!(source = ?args.source, polling = args.poll, "dashboard starting");

    let (line_tx, line_rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(controller, source);
    session
        .run(line_rx, |s| {
            let screen = render_dashboard(s.controller(), s.notice(), Utc::now());
            let mut stdout = std::io::stdout().lock();
            // clear screen, cursor home
            let _ = write!(stdout, "\x1b[2J\x1b[H{screen}\n> ");
            let _ = stdout.flush();
        })
        .await;

    Ok(())
}
