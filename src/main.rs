// src/main.rs

//! Entry point for one `quorumd` processor.

use anyhow::Result;
use quorumd::config::Config;
use quorumd::server;
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();
    if args.contains(&"--version".to_string()) {
        println!("quorumd version {VERSION}");
        return Ok(());
    }

    let config_path = args.iter().position(|arg| arg == "--config").and_then(|i| args.get(i + 1)).map(|s| s.as_str());

    let config = match Config::from_file_and_env(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(log_level)).compact().with_ansi(true).init();

    info!(id = config.id, "Starting quorumd {}...", VERSION);

    if let Err(e) = server::run(config).await {
        error!("quorumd runtime error: {}", e);
        return Err(e);
    }
    Ok(())
}
