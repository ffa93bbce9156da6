//! # JSON Exporter Library
//!
//! A configurable Prometheus exporter for upstream HTTP APIs that speak
//! JSON (e.g. Elasticsearch `/_cluster/health` or `/_nodes/stats`).
//!
//! This library provides components for:
//! - **Declarative extraction**: a YAML-described tree mapping JSON paths
//!   (with wildcards and capture groups) to labelled metrics
//! - **Modifier pipelines**: ordered scalar transforms such as `mul` and `eq`
//! - **Scrape orchestration**: concurrent endpoint fetches with per-fetch
//!   deadlines and `up` self-metrics
//! - **Exposition**: Prometheus text format rendering
//!
//! # Examples
//!
//! ```no_run
//! use json_exporter::{compile::CompiledConfig, config::Config, scrape::Scraper};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_from_path("elasticsearch.yaml")?;
//! let compiled = CompiledConfig::compile(&config)?;
//!
//! let base_url = Some("http://localhost:9200".parse()?);
//! let scraper = Scraper::new(compiled, base_url, Duration::from_secs(30));
//!
//! let state = json_exporter::http::AppState::new(scraper);
//! let app = json_exporter::http::build_router(state);
//! # Ok(())
//! # }
//! ```

pub mod compile;
pub mod config;
pub mod exposition;
pub mod expr;
pub mod extract;
pub mod http;
pub mod modifier;
pub mod sample;
pub mod scrape;

// Re-export commonly used types for convenience
pub use compile::CompiledConfig;
pub use config::Config;
pub use sample::{MetricType, Sample};
pub use scrape::Scraper;
