//! # JSON Exporter CLI
//!
//! Command-line interface for the JSON exporter.
//!
//! Loads and compiles the YAML configuration, then serves the scrape
//! endpoint until the process is stopped. Exit codes: 0 on normal
//! termination, 2 on configuration errors, 1 on runtime fatals.

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use json_exporter::http::{build_router, AppState};
use json_exporter::{CompiledConfig, Config, Scraper};

mod cli;

use cli::Cli;

const EXIT_RUNTIME: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let config = match Config::load_from_path(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("cannot load {}: {e}", cli.config.display());
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let compiled = match CompiledConfig::compile(&config) {
        Ok(compiled) => compiled,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let addr: SocketAddr = match cli.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("invalid listen address {:?}: {e}", cli.listen);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let scraper = Scraper::new(compiled, cli.base_url, cli.scrape_timeout);
    let app = build_router(AppState::new(scraper));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("cannot bind {addr}: {e}");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };
    tracing::info!("starting json-exporter on http://{addr}");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        return ExitCode::from(EXIT_RUNTIME);
    }
    ExitCode::SUCCESS
}
