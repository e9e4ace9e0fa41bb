//! Top Articles CLI
//!
//! Prints the names of the most-commented articles, one per line, highest
//! first. Logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! # Top 10 articles
//! top-articles -l 10
//!
//! # Gentler on the upstream, with debug logs
//! top-articles -l 25 --rps 2 --debug
//! ```
//!
//! Exit codes: 0 on success or interrupt, 1 on a failed run, 2 on invalid
//! configuration.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use top_articles::{App, ArticlesError, PipelineConfig, Result};

/// Top Articles
#[derive(Parser, Debug)]
#[command(name = "top-articles")]
#[command(about = "Print the most-commented articles from the paginated articles API")]
#[command(version)]
struct Args {
    /// Number of articles to print (1-100)
    #[arg(short, long)]
    limit: usize,

    /// Articles API endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum requests per second
    #[arg(long)]
    rps: Option<f64>,

    /// Burst allowance for the rate limiter
    #[arg(long)]
    burst: Option<usize>,

    /// Number of concurrent fetchers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_env()?.with_limit(self.limit);
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        if let Some(rps) = self.rps {
            config = config.with_requests_per_second(rps);
        }
        if let Some(burst) = self.burst {
            config = config.with_burst(burst);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app = match args.config().and_then(App::new) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Cannot start articles service");
            eprintln!("{}", e.user_description());
            return ExitCode::from(2);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    match app.run(&cancel).await {
        Ok(names) => match print_names(&names) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "Failed to write results");
                ExitCode::FAILURE
            }
        },
        Err(ArticlesError::Cancelled) if cancel.is_cancelled() => {
            info!("Interrupted, exiting without results");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Articles service stopped with error");
            ExitCode::FAILURE
        }
    }
}

fn print_names(names: &[String]) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    for name in names {
        writeln!(out, "{}", name)?;
    }
    out.flush()
}

/// Cancel `token` on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, cancelling run");
    token.cancel();
}
