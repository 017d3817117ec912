// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments and the optional config file
// 2. Build the fetchers (plain HTTP, plus headless Chromium with --render)
// 3. Run the crawl, logging its events as they arrive
// 4. Exit with proper code (0 = sitemap written, 1 = crawl failed, 2 = bad setup)
//
// Ctrl-C sets the engine's abort flag; the crawl stops before the next URL
// and no sitemap is written.
// =============================================================================

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use sitemap_crawler::crawl::{CrawlEngine, CrawlEvent, CrawlSummary};
use sitemap_crawler::error::CrawlError;
use sitemap_crawler::fetch::{Fetcher, HttpFetcher, Renderer};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = sitemap written
//   Ok(1) = crawl failed or was cancelled
//   Err   = config or startup error (exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = cli.crawl_options().context("invalid configuration")?;

    println!("🔍 Crawling website: {}", options.base_url);
    println!("📊 Max crawl depth: {}", options.max_depth);

    let http: Arc<dyn Fetcher> = Arc::new(
        HttpFetcher::new(&options.user_agent, options.request_timeout)
            .context("failed to build HTTP client")?,
    );
    let pages: Arc<dyn Fetcher> = match &options.render {
        Some(render) => {
            println!("🧭 Rendering pages with headless Chromium");
            Arc::new(Renderer::new(render.clone(), &options.user_agent))
        }
        None => http.clone(),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let engine = CrawlEngine::new(options, http, pages).with_events(tx);

    let abort = engine.abort_handle();
    tokio::spawn(cancel_on_ctrl_c(abort));
    let listener = tokio::spawn(log_events(rx));

    let result = engine.run().await;
    // The engine dropped its sender, so the listener drains and exits
    wait_for_listener(listener).await;

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(0)
        }
        Err(CrawlError::Cancelled) => {
            println!("⚠️  Crawl cancelled, no sitemap written");
            Ok(1)
        }
        Err(e) => {
            eprintln!("❌ Crawl failed: {}", e);
            Ok(1)
        }
    }
}

/// Log to stderr. RUST_LOG wins over --verbose when set.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "sitemap_crawler=debug"
    } else {
        "sitemap_crawler=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cancel_on_ctrl_c(abort: Arc<AtomicBool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, stopping crawl");
        abort.store(true, Ordering::SeqCst);
    }
}

async fn log_events(mut rx: UnboundedReceiver<CrawlEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            CrawlEvent::Add(url) => info!(%url, "mapped"),
            CrawlEvent::Ignore(url) => info!(%url, "ignored"),
            CrawlEvent::Error(issue) => warn!(
                code = ?issue.code,
                url = issue.url.as_deref().unwrap_or("-"),
                "{}",
                issue.message
            ),
            CrawlEvent::Done => info!("Sitemap crawl complete"),
        }
    }
}

// Returns: false if the listener task panicked or was cancelled
async fn wait_for_listener(listener: JoinHandle<()>) -> bool {
    match listener.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "event listener stopped early");
            false
        }
    }
}

fn print_summary(summary: &CrawlSummary) {
    println!();
    println!("📊 Summary:");
    println!("   📄 Pages mapped: {}", summary.entries.len());
    println!("   🔗 URLs visited: {}", summary.visited);
    if let Some(index) = &summary.files.index {
        println!("   🗂️  Sitemap index: {}", index.display());
    }
    for path in &summary.files.sitemaps {
        println!("   ✅ Wrote {}", path.display());
    }
}
