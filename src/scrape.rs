//! Per-scrape orchestration: endpoint fan-out and global label resolution.
//!
//! A scrape fans out one fetch per endpoint plus one per global label
//! source, all concurrently, each with its own deadline. Failed fetches
//! surface as `up{endpoint=..} 0` and never fail the scrape; dropping the
//! scrape future (client disconnect) cancels every in-flight fetch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::compile::{CompiledConfig, CompiledGlobalLabels};
use crate::exposition;
use crate::extract;
use crate::sample::{MetricType, Sample};

/// Errors that can fail a single upstream fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint URL did not parse or join against the base URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    /// Network failure, timeout, or non-2xx response.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The response body was not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Executes scrapes against the compiled configuration.
///
/// The scraper holds the only mutable runtime state of the process: a pair
/// of atomically updated self-metric counters.
pub struct Scraper {
    client: reqwest::Client,
    base_url: Option<Url>,
    timeout: Duration,
    config: CompiledConfig,
    scrapes_total: AtomicU64,
    fetch_failures_total: AtomicU64,
}

impl Scraper {
    /// Create a new scraper.
    ///
    /// # Parameters
    ///
    /// - `config` - Compiled configuration, immutable for the process
    /// - `base_url` - Base every relative endpoint URL is joined against
    /// - `timeout` - Per-fetch deadline
    ///
    /// # Returns
    ///
    /// Returns a new `Scraper` instance with its own HTTP client.
    pub fn new(config: CompiledConfig, base_url: Option<Url>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
            config,
            scrapes_total: AtomicU64::new(0),
            fetch_failures_total: AtomicU64::new(0),
        }
    }

    /// Run one scrape and render the exposition body.
    ///
    /// Always succeeds: endpoints that fail to fetch contribute only their
    /// `up` sample, and per-sample extraction failures are logged and
    /// skipped.
    ///
    /// # Returns
    ///
    /// Returns the Prometheus text format body.
    pub async fn scrape(&self) -> String {
        self.scrapes_total.fetch_add(1, Ordering::Relaxed);

        let endpoint_fetches =
            join_all(self.config.endpoints.iter().map(|e| self.fetch_json(&e.url)));
        let global_fetches =
            join_all(self.config.global_labels.iter().map(|g| self.fetch_json(&g.url)));
        let (endpoint_bodies, global_bodies) = tokio::join!(endpoint_fetches, global_fetches);

        let mut samples = Vec::new();
        for (endpoint, fetched) in self.config.endpoints.iter().zip(endpoint_bodies) {
            match fetched {
                Ok(json) => {
                    samples.push(up_sample(&endpoint.id, 1.0));
                    let extraction = extract::extract(&self.config.namespace, endpoint, &json);
                    for warning in &extraction.warnings {
                        tracing::warn!(endpoint = %endpoint.id, "{warning}");
                    }
                    samples.extend(extraction.samples);
                }
                Err(e) => {
                    self.fetch_failures_total.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(endpoint = %endpoint.id, "fetch failed: {e}");
                    samples.push(up_sample(&endpoint.id, 0.0));
                }
            }
        }

        let global_labels = resolve_global_labels(&self.config.global_labels, &global_bodies);
        for sample in &mut samples {
            for (name, value) in &global_labels {
                sample.labels.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }

        let exposition = exposition::write_samples(&samples);
        for warning in &exposition.warnings {
            tracing::warn!("{warning}");
        }
        tracing::debug!(
            scrapes = self.scrapes_total.load(Ordering::Relaxed),
            fetch_failures = self.fetch_failures_total.load(Ordering::Relaxed),
            samples = samples.len(),
            "scrape complete"
        );
        exposition.body
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let url = match &self.base_url {
            Some(base) => base.join(url)?,
            None => Url::parse(url)?,
        };
        tracing::debug!("fetching {url}");
        let text = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn up_sample(endpoint: &str, value: f64) -> Sample {
    let mut labels = BTreeMap::new();
    labels.insert("endpoint".to_string(), endpoint.to_string());
    Sample::new("up", MetricType::Gauge, labels, value)
}

/// Merge the label sets produced by the global label sources.
///
/// Later sources override earlier ones on name clash; a failed fetch or an
/// unresolvable value skips that entry with a warning.
fn resolve_global_labels(
    sources: &[CompiledGlobalLabels],
    bodies: &[Result<Value, FetchError>],
) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for (source, body) in sources.iter().zip(bodies) {
        let json = match body {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(url = %source.url, "global labels fetch failed: {e}");
                continue;
            }
        };
        for label in &source.labels {
            match label.value.render(json, &[]) {
                Some(value) => {
                    merged.insert(label.name.clone(), value);
                }
                None => {
                    tracing::warn!(
                        url = %source.url,
                        "global label {} did not resolve",
                        label.name
                    );
                }
            }
        }
    }
    merged
}
