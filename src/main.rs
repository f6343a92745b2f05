mod collectors;
mod config;
mod format;
mod http;
mod metrics;
mod pages;

use axum::serve;
use clap::Parser;
use collectors::Collector;
use config::Config;
use http::{ApiSnapshot, HttpAppState};
use metrics::Metrics;
use pages::PageOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostdash")]
#[command(version)]
struct Cli {
    /// YAML config file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    /// Overrides `listen` from the config file.
    #[arg(long)]
    listen: Option<String>,
    /// Collect one snapshot, print it as JSON and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
        if let Err(err) = cfg.validate() {
            error!(error = %err, "invalid --listen override");
            std::process::exit(1);
        }
    }

    let collector = Arc::new(Collector::system(cfg.disk_path.clone()));

    if cli.once {
        run_once(&collector, &cfg).await;
        return;
    }

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialise metrics");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, listen = %addr, "failed to start HTTP server");
            std::process::exit(1);
        }
    };

    info!(
        listen = %addr,
        sample_window_ms = cfg.sample_window_ms,
        disk_path = %cfg.disk_path.display(),
        "starting hostdash"
    );

    let app = http::build_router(HttpAppState {
        metrics,
        collector,
        sample_window: cfg.sample_window(),
        page_options: PageOptions {
            refresh_secs: cfg.refresh_secs,
        },
    });

    let server = serve(listener, app).with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to wait for Ctrl+C");
        }
        info!("received Ctrl+C, shutting down");
    });

    if let Err(err) = server.await {
        error!(error = %err, "HTTP server error");
        std::process::exit(1);
    }
}

async fn run_once(collector: &Arc<Collector>, cfg: &Config) {
    let collector = collector.clone();
    let window = cfg.sample_window();
    let snapshot = match tokio::task::spawn_blocking(move || collector.collect(window)).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(err)) => {
            error!(reason = err.reason(), error = %err, "snapshot collection failed");
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "collection task failed");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&ApiSnapshot::from(&snapshot)) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            error!(error = %err, "failed to encode snapshot");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
