//! Command-line interface definitions for the JSON exporter.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

/// Command-line arguments for the JSON exporter.
///
/// This structure defines all command-line options and their default values
/// for configuring the exporter.
#[derive(Debug, Parser)]
#[command(name = "json-exporter")]
#[command(
    author,
    version,
    about = "Prometheus exporter for JSON HTTP APIs, driven by a YAML metric tree"
)]
pub struct Cli {
    /// Base URL prepended to every relative endpoint URL
    #[arg(long)]
    pub base_url: Option<Url>,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:9114")]
    pub listen: String,

    /// Per-fetch deadline for upstream requests (e.g. 10s, 500ms)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub scrape_timeout: Duration,

    /// Path to the YAML configuration file
    pub config: PathBuf,
}
